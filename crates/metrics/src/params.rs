//! Window and exposure parameters.

use std::collections::BTreeMap;

use flowline_config::{EvaluationMode, ThresholdMetricSpec};

use crate::error::MetricsError;
use crate::Result;

#[cfg(test)]
#[path = "params_test.rs"]
mod tests;

/// Parameters of one sliding-window accounting database.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowParams {
    /// Label distinguishing databases sharing one exporter; may be
    /// empty for a single unnamed database
    pub traffic_type: String,
    /// Sliding window size in buckets
    pub buckets: usize,
    /// Buckets averaged for the threshold check; 0 means the whole
    /// window
    pub threshold_buckets: usize,
    /// Buckets averaged for reported values; also the length of the
    /// counter arrays
    pub report_buckets: usize,
    /// Duration of one bucket in seconds
    pub bucket_duration: u64,
    /// Strict lower bound on average bits per second for exposure
    pub threshold_bps: u64,
    /// Strict lower bound on average packets per second for exposure
    pub threshold_pps: u64,
    /// Which address(es) of a flow key into the database
    pub evaluation_mode: EvaluationMode,
    /// Empty records are removed every this many window durations
    pub cleanup_window_sizes: usize,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            traffic_type: String::new(),
            buckets: 60,
            threshold_buckets: 60,
            report_buckets: 60,
            bucket_duration: 1,
            threshold_bps: 0,
            threshold_pps: 0,
            evaluation_mode: EvaluationMode::default(),
            cleanup_window_sizes: 5,
        }
    }
}

impl WindowParams {
    /// Parse window parameters from a segment option map.
    ///
    /// Unparseable numeric options warn and keep their defaults;
    /// out-of-range values and unknown evaluation modes are errors.
    pub fn from_options(opts: &BTreeMap<String, String>, segment: &str) -> Result<Self> {
        let mut params = Self::default();

        params.buckets = positive_or_default(opts, "buckets", params.buckets, segment)?;
        // the two derived window sizes default to the full window
        params.threshold_buckets = params.buckets;
        params.report_buckets = params.buckets;
        params.threshold_buckets =
            positive_or_default(opts, "thresholdbuckets", params.threshold_buckets, segment)?;
        params.report_buckets =
            positive_or_default(opts, "reportbuckets", params.report_buckets, segment)?;
        params.bucket_duration = positive_or_default(
            opts,
            "bucketduration",
            params.bucket_duration as usize,
            segment,
        )? as u64;
        params.cleanup_window_sizes = positive_or_default(
            opts,
            "cleanupwindowsizes",
            params.cleanup_window_sizes,
            segment,
        )?;

        params.threshold_bps = parse_or_default(opts, "thresholdbps", 0, segment);
        params.threshold_pps = parse_or_default(opts, "thresholdpps", 0, segment);

        if let Some(traffic_type) = opts.get("traffictype") {
            params.traffic_type = traffic_type.clone();
        }
        if let Some(mode) = opts.get("relevantaddress") {
            params.evaluation_mode = mode
                .parse()
                .map_err(|reason: String| MetricsError::invalid_param("relevantaddress", reason))?;
        }

        Ok(params)
    }

    /// Build window parameters from the typed configuration block of
    /// the traffic-specific top-talkers segment.
    pub fn from_spec(spec: &ThresholdMetricSpec) -> Result<Self> {
        let mut params = Self {
            traffic_type: spec.traffictype.clone(),
            ..Self::default()
        };
        if let Some(buckets) = spec.buckets {
            require_positive("buckets", buckets)?;
            params.buckets = buckets;
            params.threshold_buckets = buckets;
            params.report_buckets = buckets;
        }
        if let Some(threshold_buckets) = spec.thresholdbuckets {
            require_positive("thresholdbuckets", threshold_buckets)?;
            params.threshold_buckets = threshold_buckets;
        }
        if let Some(report_buckets) = spec.reportbuckets {
            require_positive("reportbuckets", report_buckets)?;
            params.report_buckets = report_buckets;
        }
        if let Some(bucket_duration) = spec.bucketduration {
            require_positive("bucketduration", bucket_duration as usize)?;
            params.bucket_duration = bucket_duration;
        }
        if let Some(cleanup) = spec.cleanupwindowsizes {
            require_positive("cleanupwindowsizes", cleanup)?;
            params.cleanup_window_sizes = cleanup;
        }
        params.threshold_bps = spec.thresholdbps.unwrap_or(0);
        params.threshold_pps = spec.thresholdpps.unwrap_or(0);
        if let Some(mode) = spec.relevantaddress {
            params.evaluation_mode = mode;
        }
        Ok(params)
    }

    /// Window duration in seconds (`buckets * bucket_duration`), the
    /// cleanup tick cadence.
    pub fn window_secs(&self) -> u64 {
        self.buckets as u64 * self.bucket_duration
    }
}

/// Parameters of the HTTP exposure endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterParams {
    /// Listen address, `:8080` style or a full socket address
    pub endpoint: String,
    /// Path serving the meta registry
    pub metrics_path: String,
    /// Path serving the accounting registry
    pub flowdata_path: String,
}

impl Default for ExporterParams {
    fn default() -> Self {
        Self {
            endpoint: ":8080".to_string(),
            metrics_path: "/metrics".to_string(),
            flowdata_path: "/flowdata".to_string(),
        }
    }
}

impl ExporterParams {
    /// Parse exposure parameters from a segment option map.
    pub fn from_options(opts: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            endpoint: non_empty(opts, "endpoint", defaults.endpoint),
            metrics_path: non_empty(opts, "metricspath", defaults.metrics_path),
            flowdata_path: non_empty(opts, "flowdatapath", defaults.flowdata_path),
        }
    }
}

fn non_empty(opts: &BTreeMap<String, String>, key: &str, default: String) -> String {
    match opts.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default,
    }
}

fn parse_or_default(opts: &BTreeMap<String, String>, key: &str, default: u64, segment: &str) -> u64 {
    match opts.get(key) {
        Some(value) if !value.is_empty() => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(
                    segment,
                    option = key,
                    value = %value,
                    default,
                    "could not parse option, using default"
                );
                default
            }
        },
        _ => default,
    }
}

/// Parse a positive integer option; garbage warns and keeps the
/// default, an explicit non-positive value is an error.
fn positive_or_default(
    opts: &BTreeMap<String, String>,
    key: &str,
    default: usize,
    segment: &str,
) -> Result<usize> {
    match opts.get(key) {
        Some(value) if !value.is_empty() => match value.parse::<i64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed as usize),
            Ok(_) => Err(MetricsError::invalid_param(key, "has to be > 0")),
            Err(_) => {
                tracing::warn!(
                    segment,
                    option = key,
                    value = %value,
                    default,
                    "could not parse option, using default"
                );
                Ok(default)
            }
        },
        _ => Ok(default),
    }
}

fn require_positive(param: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(MetricsError::invalid_param(param, "has to be > 0"));
    }
    Ok(())
}
