//! Tests for the sync_timestamps segment

use super::*;
use flowline_flow::Flow;
use flowline_pipeline::testing::run_segment;

#[tokio::test]
async fn test_fills_missing_representations() {
    let flow = Flow {
        time_flow_start: 100,
        time_flow_end_ms: 104_000,
        ..Default::default()
    };
    let (out, _) = run_segment(Box::new(SyncTimestamps), vec![flow]).await;

    assert_eq!(out[0].time_flow_start_ms, 100_000);
    assert_eq!(out[0].time_flow_start_ns, 100_000_000_000);
    assert_eq!(out[0].time_flow_end, 104);
    assert_eq!(out[0].time_flow_end_ns, 104_000_000_000);
}
