//! The `normalize` segment multiplies byte and packet counts by the
//! flow's sampling rate, so downstream accounting sees estimated real
//! traffic instead of sampled counts.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `fallback` | 0 | sampling rate assumed when the flow carries none |
//!
//! Flows normalized here are marked, and flows without any usable rate
//! pass through untouched.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_flow::Normalized;
use flowline_pipeline::{
    optional_parsed, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;

pub struct Normalize {
    fallback: u64,
}

#[async_trait]
impl Segment for Normalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(mut flow) = io.rx.recv().await {
            if flow.normalized != Normalized::Normalized {
                let rate = if flow.sampling_rate > 0 {
                    flow.sampling_rate
                } else {
                    self.fallback
                };
                if rate > 0 {
                    flow.bytes = flow.bytes.saturating_mul(rate);
                    flow.packets = flow.packets.saturating_mul(rate);
                    flow.sampling_rate = rate;
                    flow.normalized = Normalized::Normalized;
                }
            }
            if !io.forward(flow).await {
                break;
            }
        }
    }
}

pub struct NormalizeFactory;

impl SegmentFactory for NormalizeFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        Ok(Box::new(Normalize {
            fallback: optional_parsed(&opts, "fallback", 0u64, self.name()),
        }))
    }

    fn name(&self) -> &'static str {
        "normalize"
    }
}
