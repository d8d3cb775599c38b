//! Tests for the pass segment

use super::*;
use flowline_flow::{Flow, FlowType};
use flowline_pipeline::testing::run_segment;

#[tokio::test]
async fn test_pass_forwards_unchanged() {
    let flow = Flow {
        flow_type: FlowType::NetflowV9,
        bytes: 42,
        ..Default::default()
    };
    let (out, drops) = run_segment(Box::new(Pass), vec![flow.clone()]).await;
    assert_eq!(out, vec![flow]);
    assert!(drops.is_empty());
}

#[tokio::test]
async fn test_pass_preserves_order() {
    let input: Vec<Flow> = (0..10)
        .map(|i| Flow {
            sequence_num: i,
            ..Default::default()
        })
        .collect();
    let (out, _) = run_segment(Box::new(Pass), input.clone()).await;
    assert_eq!(out, input);
}
