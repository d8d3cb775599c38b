//! Tests for the count segment

use super::*;
use flowline_flow::Flow;
use flowline_pipeline::testing::run_segment;

#[tokio::test]
async fn test_count_passes_everything_through() {
    let input = vec![Flow::default(), Flow::default(), Flow::default()];
    let segment = CountFactory
        .create(&SegmentConfig::default(), &[])
        .unwrap();
    let (out, drops) = run_segment(segment, input).await;
    assert_eq!(out.len(), 3);
    assert!(drops.is_empty());
}
