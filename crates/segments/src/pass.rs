//! The `pass` segment simply passes flows on. Useful as an explicit
//! no-op in configs and as the building block of empty branch paths.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_pipeline::{Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle};

#[cfg(test)]
#[path = "pass_test.rs"]
mod tests;

pub struct Pass;

#[async_trait]
impl Segment for Pass {
    fn name(&self) -> &'static str {
        "pass"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(flow) = io.rx.recv().await {
            if !io.forward(flow).await {
                break;
            }
        }
    }
}

pub struct PassFactory;

impl SegmentFactory for PassFactory {
    fn create(&self, _config: &SegmentConfig, _args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(Pass))
    }

    fn name(&self) -> &'static str {
        "pass"
    }
}
