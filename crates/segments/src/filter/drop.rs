//! The `drop` segment discards every flow. On its own it terminates a
//! pipeline path; inside a `branch` condition it sends everything to
//! `else`.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_pipeline::{Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle};

#[cfg(test)]
#[path = "drop_test.rs"]
mod tests;

pub struct Drop;

#[async_trait]
impl Segment for Drop {
    fn name(&self) -> &'static str {
        "drop"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(flow) = io.rx.recv().await {
            io.drop_flow(flow).await;
        }
    }
}

pub struct DropFactory;

impl SegmentFactory for DropFactory {
    fn create(&self, _config: &SegmentConfig, _args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(Drop))
    }

    fn name(&self) -> &'static str {
        "drop"
    }

    fn is_filter(&self) -> bool {
        true
    }
}
