//! Tests for the remoteaddress segment

use super::*;
use flowline_flow::Flow;
use flowline_pipeline::testing::run_segment;

fn border() -> Box<dyn Segment> {
    RemoteAddressFactory
        .create(&SegmentConfig::from_pairs([("policy", "border")]), &[])
        .unwrap()
}

#[tokio::test]
async fn test_border_policy_follows_flow_direction() {
    let incoming = Flow {
        flow_direction: 0,
        ..Default::default()
    };
    let outgoing = Flow {
        flow_direction: 1,
        ..Default::default()
    };
    let (out, _) = run_segment(border(), vec![incoming, outgoing]).await;
    assert_eq!(out[0].remote_addr, RemoteAddrSide::Src);
    assert_eq!(out[1].remote_addr, RemoteAddrSide::Dst);
}

#[test]
fn test_unknown_policy_fails_construction() {
    assert!(RemoteAddressFactory
        .create(&SegmentConfig::from_pairs([("policy", "inside-out")]), &[])
        .is_err());
}
