//! The `count` segment counts flows and logs the total when its input
//! closes. Meant for debugging pipelines and for tests.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_pipeline::{optional, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle};

#[cfg(test)]
#[path = "count_test.rs"]
mod tests;

pub struct Count {
    prefix: String,
}

#[async_trait]
impl Segment for Count {
    fn name(&self) -> &'static str {
        "count"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        let mut total: u64 = 0;
        while let Ok(flow) = io.rx.recv().await {
            total += 1;
            if !io.forward(flow).await {
                break;
            }
        }
        tracing::info!("{}{}", self.prefix, total);
    }
}

pub struct CountFactory;

impl SegmentFactory for CountFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        Ok(Box::new(Count {
            prefix: optional(&opts, "prefix", ""),
        }))
    }

    fn name(&self) -> &'static str {
        "count"
    }
}
