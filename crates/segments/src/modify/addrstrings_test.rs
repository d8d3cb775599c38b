//! Tests for the addrstrings segment

use super::*;
use flowline_flow::Flow;
use flowline_pipeline::testing::run_segment;

#[tokio::test]
async fn test_fills_textual_forms() {
    let flow = Flow {
        src_addr: vec![10, 0, 0, 1],
        dst_addr: vec![10, 0, 0, 2],
        src_mac: 0x0000_aabb_ccdd_eeff,
        ..Default::default()
    };
    let (out, _) = run_segment(Box::new(AddrStrings), vec![flow]).await;
    assert_eq!(out[0].source_ip, "10.0.0.1");
    assert_eq!(out[0].destination_ip, "10.0.0.2");
    assert_eq!(out[0].source_mac, "aa:bb:cc:dd:ee:ff");
    assert_eq!(out[0].destination_mac, "");
    assert_eq!(out[0].next_hop_ip, "");
}

#[tokio::test]
async fn test_existing_strings_untouched() {
    let flow = Flow {
        src_addr: vec![10, 0, 0, 1],
        source_ip: "already-set".into(),
        ..Default::default()
    };
    let (out, _) = run_segment(Box::new(AddrStrings), vec![flow]).await;
    assert_eq!(out[0].source_ip, "already-set");
}
