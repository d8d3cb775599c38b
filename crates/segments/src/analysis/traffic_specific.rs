//! The `traffic_specific_toptalkers` segment accounts traffic per
//! address for configurable traffic classes, selected by filter
//! expressions. It is a pass-through segment: every flow continues
//! downstream, matching flows are additionally accounted.
//!
//! Classes come from the typed `traffic_specific_toptalkers` config
//! block: each definition carries window parameters, a `filter`
//! expression and optional nested `subfilter` definitions that are only
//! evaluated for flows their parent matched. Definitions without a
//! `traffictype` exist only to scope their subfilters and get no
//! database of their own.
//!
//! ```yaml
//! - segment: traffic_specific_toptalkers
//!   config:
//!     endpoint: ":8080"
//!     traffic_specific_toptalkers:
//!     - traffictype: udp
//!       filter: proto udp
//!       thresholdbps: 1000000
//!       subfilter:
//!       - traffictype: dns
//!         filter: port 53
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use flowline_config::{EvaluationMode, SegmentConfig, ThresholdMetricSpec};
use flowline_filter::{evaluate, parse, Expression};
use flowline_flow::Flow;
use flowline_metrics::{account_keys, Database, ExporterParams, FlowExporter, TrafficCollector, WindowParams};
use flowline_pipeline::{
    PipelineError, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};
use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "traffic_specific_test.rs"]
mod tests;

/// One traffic class: a filter, an optional database, nested classes.
struct ThresholdMetric {
    expression: Expression,
    database: Option<Arc<Database>>,
    subs: Vec<ThresholdMetric>,
}

impl ThresholdMetric {
    fn from_spec(
        spec: &ThresholdMetricSpec,
        mode_override: Option<EvaluationMode>,
        segment: &str,
    ) -> Result<Self> {
        let expression = parse(&spec.filter).map_err(|error| {
            PipelineError::construction(segment, format!("in '{}': {error}", spec.filter))
        })?;

        let mut params = WindowParams::from_spec(spec)
            .map_err(|error| PipelineError::construction(segment, error.to_string()))?;
        if let Some(mode) = mode_override {
            params.evaluation_mode = mode;
        }

        let database = (!spec.traffictype.is_empty())
            .then(|| Arc::new(Database::new(params, None)));

        let subs = spec
            .subfilter
            .iter()
            .map(|sub| Self::from_spec(sub, mode_override, segment))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            expression,
            database,
            subs,
        })
    }

    fn databases(&self) -> Vec<Arc<Database>> {
        let mut databases = Vec::new();
        if let Some(database) = &self.database {
            databases.push(Arc::clone(database));
        }
        for sub in &self.subs {
            databases.extend(sub.databases());
        }
        databases
    }

    /// Account `flow` here and in subclasses, but only descend while
    /// the filters keep matching.
    fn account(&self, flow: &Flow) {
        if !matches!(evaluate(&self.expression, flow), Ok(true)) {
            return;
        }
        if let Some(database) = &self.database {
            for key in account_keys(flow, database.params().evaluation_mode) {
                database.append(&key, flow);
            }
        }
        for sub in &self.subs {
            sub.account(flow);
        }
    }
}

pub struct TrafficSpecific {
    exporter_params: ExporterParams,
    metrics: Vec<ThresholdMetric>,
}

#[async_trait]
impl Segment for TrafficSpecific {
    fn name(&self) -> &'static str {
        "traffic_specific_toptalkers"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        let exporter = FlowExporter::new();
        let databases: Vec<Arc<Database>> =
            self.metrics.iter().flat_map(|m| m.databases()).collect();

        if let Err(error) = exporter.register_collector(TrafficCollector::new(databases.clone())) {
            tracing::error!(%error, "failed to register the accounting collector");
        }

        let token = CancellationToken::new();
        let server = match exporter.serve(&self.exporter_params, token.clone()).await {
            Ok(handle) => Some(handle),
            Err(error) => {
                tracing::error!(%error, "metrics endpoint unavailable, accounting continues");
                None
            }
        };
        let mut tasks: Vec<_> = databases
            .iter()
            .flat_map(|db| db.start_tickers(&token))
            .collect();
        if let Some(server) = server {
            tasks.push(server);
        }

        while let Ok(flow) = io.rx.recv().await {
            exporter.flow_count.inc();
            for metric in &self.metrics {
                metric.account(&flow);
            }
            if !io.forward(flow).await {
                break;
            }
        }

        token.cancel();
        for task in tasks {
            let _ = task.await;
        }
    }
}

pub struct TrafficSpecificFactory;

impl SegmentFactory for TrafficSpecificFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        let mode_override = match opts.get("relevantaddress") {
            Some(value) if !value.is_empty() => {
                Some(value.parse::<EvaluationMode>().map_err(|reason| {
                    PipelineError::construction(self.name(), reason)
                })?)
            }
            _ => None,
        };

        let metrics = config
            .traffic_specific_toptalkers
            .iter()
            .map(|spec| ThresholdMetric::from_spec(spec, mode_override, self.name()))
            .collect::<Result<Vec<_>>>()?;
        if metrics.is_empty() {
            tracing::warn!(
                segment = self.name(),
                "no traffic_specific_toptalkers definitions configured, segment is a no-op"
            );
        }

        Ok(Box::new(TrafficSpecific {
            exporter_params: ExporterParams::from_options(&opts),
            metrics,
        }))
    }

    fn name(&self) -> &'static str {
        "traffic_specific_toptalkers"
    }
}
