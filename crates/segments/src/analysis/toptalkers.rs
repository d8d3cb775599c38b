//! The `toptalkers_metrics` segment accounts traffic levels per IP
//! address into a sliding window and exports them via OpenMetrics.
//!
//! Traffic is counted in bits and packets per second, split into
//! forwarded and dropped. By default the destination address is
//! accounted; `relevantaddress` switches to the source, both, or the
//! source→destination connection. Only records whose average exceeded
//! the configured thresholds during the threshold window are exported.
//! The same flag drives the filter behavior: flows for above-threshold
//! addresses pass, all others are dropped, so the segment doubles as an
//! "unusual traffic" filter inside a `branch`.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `traffictype` | `""` | metric label, lets several instances share a scrape |
//! | `buckets` | 60 | sliding window size in buckets |
//! | `bucketduration` | 1 | seconds per bucket |
//! | `thresholdbuckets` | buckets | window for the threshold check |
//! | `reportbuckets` | buckets | window for reported averages |
//! | `thresholdbps` | 0 | minimum bits/s for exposure |
//! | `thresholdpps` | 0 | minimum packets/s for exposure |
//! | `cleanupwindowsizes` | 5 | idle-record removal cadence |
//! | `relevantaddress` | destination | source, destination, both, connection |
//! | `endpoint` | `:8080` | HTTP listen address |
//! | `metricspath` | `/metrics` | meta registry path |
//! | `flowdatapath` | `/flowdata` | accounting registry path |
//!
//! Counter correctness relies on a single accounting instance; run this
//! segment with `jobs: 1`.

use std::sync::Arc;

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_metrics::{account_keys, Database, ExporterParams, FlowExporter, TrafficCollector, WindowParams};
use flowline_pipeline::{
    PipelineError, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};
use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "toptalkers_test.rs"]
mod tests;

pub struct ToptalkersMetrics {
    window: WindowParams,
    exporter_params: ExporterParams,
}

#[async_trait]
impl Segment for ToptalkersMetrics {
    fn name(&self) -> &'static str {
        "toptalkers_metrics"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        let exporter = FlowExporter::new();
        let database = Arc::new(Database::new(
            self.window.clone(),
            Some(exporter.db_size.clone()),
        ));

        if let Err(error) = exporter.register_collector(TrafficCollector::new(vec![Arc::clone(
            &database,
        )])) {
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
        let mut tasks = database.start_tickers(&token);
        if let Some(server) = server {
            tasks.push(server);
        }

        let mode = self.window.evaluation_mode;
        while let Ok(flow) = io.rx.recv().await {
            exporter.flow_count.inc();
            let mut above_threshold = false;
            for key in account_keys(&flow, mode) {
                let record = database.append(&key, &flow);
                above_threshold |= record.above_threshold();
            }
            if above_threshold {
                if !io.forward(flow).await {
                    break;
                }
            } else {
                io.drop_flow(flow).await;
            }
        }

        token.cancel();
        for task in tasks {
            let _ = task.await;
        }
    }
}

pub struct ToptalkersMetricsFactory;

impl SegmentFactory for ToptalkersMetricsFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        let window = WindowParams::from_options(&opts, self.name())
            .map_err(|error| PipelineError::construction(self.name(), error.to_string()))?;
        Ok(Box::new(ToptalkersMetrics {
            window,
            exporter_params: ExporterParams::from_options(&opts),
        }))
    }

    fn name(&self) -> &'static str {
        "toptalkers_metrics"
    }

    fn is_filter(&self) -> bool {
        true
    }
}
