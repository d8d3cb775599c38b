//! Typed config block for the traffic-specific top-talkers segment.

use serde::Deserialize;

use crate::evaluation_mode::EvaluationMode;

/// One threshold metric definition: sliding-window parameters plus a
/// flow filter expression selecting the traffic it accounts, with
/// nested sub-definitions evaluated only when the parent matched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThresholdMetricSpec {
    /// Metric label; definitions without one only exist to scope their
    /// subfilters
    pub traffictype: String,
    /// Sliding window size in buckets
    pub buckets: Option<usize>,
    /// Buckets averaged for the threshold check (0 = whole window)
    pub thresholdbuckets: Option<usize>,
    /// Buckets averaged for the reported values
    pub reportbuckets: Option<usize>,
    /// Duration of one bucket in seconds
    pub bucketduration: Option<u64>,
    /// Minimum average bits per second for exposure
    pub thresholdbps: Option<u64>,
    /// Minimum average packets per second for exposure
    pub thresholdpps: Option<u64>,
    /// Cleanup cadence in multiples of the window size
    pub cleanupwindowsizes: Option<usize>,
    /// Which address(es) key into this metric's database
    pub relevantaddress: Option<EvaluationMode>,
    /// Flow filter expression selecting the accounted traffic
    pub filter: String,
    /// Definitions evaluated only for flows matching this filter
    pub subfilter: Vec<ThresholdMetricSpec>,
}
