//! Tests for the protomap segment

use super::*;
use flowline_flow::Flow;
use flowline_pipeline::testing::run_segment;

#[tokio::test]
async fn test_known_protocols_get_names() {
    let input = vec![
        Flow {
            proto: 6,
            ..Default::default()
        },
        Flow {
            proto: 17,
            ..Default::default()
        },
        Flow {
            proto: 254,
            ..Default::default()
        },
    ];
    let (out, _) = run_segment(Box::new(Protomap), input).await;
    assert_eq!(out[0].proto_name, "TCP");
    assert_eq!(out[1].proto_name, "UDP");
    assert_eq!(out[2].proto_name, "254");
}
