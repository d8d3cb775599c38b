//! The `sync_timestamps` segment fills missing time fields from the
//! populated representations of the same event.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_pipeline::{Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle};

#[cfg(test)]
#[path = "sync_timestamps_test.rs"]
mod tests;

pub struct SyncTimestamps;

#[async_trait]
impl Segment for SyncTimestamps {
    fn name(&self) -> &'static str {
        "sync_timestamps"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(mut flow) = io.rx.recv().await {
            flow.sync_missing_timestamps();
            if !io.forward(flow).await {
                break;
            }
        }
    }
}

pub struct SyncTimestampsFactory;

impl SegmentFactory for SyncTimestampsFactory {
    fn create(&self, _config: &SegmentConfig, _args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(SyncTimestamps))
    }

    fn name(&self) -> &'static str {
        "sync_timestamps"
    }
}
