//! Tests for the traffic_specific_toptalkers segment

use super::*;
use flowline_config::specs_from_yaml;
use flowline_pipeline::testing::run_segment;

fn typed_config() -> SegmentConfig {
    let specs = specs_from_yaml(
        r#"
- segment: traffic_specific_toptalkers
  config:
    endpoint: "127.0.0.1:0"
    traffic_specific_toptalkers:
    - traffictype: udp
      filter: proto udp
      subfilter:
      - traffictype: dns
        filter: port 53
"#,
    )
    .unwrap();
    specs[0].config.clone()
}

#[test]
fn test_factory_builds_metric_tree() {
    assert!(TrafficSpecificFactory.create(&typed_config(), &[]).is_ok());
}

#[test]
fn test_bad_filter_fails_construction() {
    let specs = specs_from_yaml(
        r#"
- segment: traffic_specific_toptalkers
  config:
    traffic_specific_toptalkers:
    - traffictype: broken
      filter: "florb 7"
"#,
    )
    .unwrap();
    assert!(TrafficSpecificFactory.create(&specs[0].config, &[]).is_err());
}

#[tokio::test]
async fn test_pass_through_and_selective_accounting() {
    let segment = TrafficSpecificFactory.create(&typed_config(), &[]).unwrap();
    let input = vec![
        Flow {
            proto: 17,
            dst_port: 53,
            bytes: 100,
            packets: 1,
            dst_addr: vec![10, 0, 0, 1],
            ..Default::default()
        },
        Flow {
            proto: 6,
            bytes: 100,
            packets: 1,
            dst_addr: vec![10, 0, 0, 2],
            ..Default::default()
        },
    ];
    let (out, drops) = run_segment(segment, input).await;
    // pass-through contract: everything continues downstream
    assert_eq!(out.len(), 2);
    assert!(drops.is_empty());
}

#[test]
fn test_metric_tree_accounts_only_matching_flows() {
    let spec = ThresholdMetricSpec {
        traffictype: "udp".into(),
        filter: "proto udp".into(),
        subfilter: vec![ThresholdMetricSpec {
            traffictype: "dns".into(),
            filter: "port 53".into(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let metric = ThresholdMetric::from_spec(&spec, None, "test").unwrap();
    let databases = metric.databases();
    assert_eq!(databases.len(), 2);

    let dns = Flow {
        proto: 17,
        dst_port: 53,
        bytes: 10,
        packets: 1,
        dst_addr: vec![10, 0, 0, 1],
        ..Default::default()
    };
    let plain_udp = Flow {
        proto: 17,
        dst_port: 5000,
        bytes: 10,
        packets: 1,
        dst_addr: vec![10, 0, 0, 1],
        ..Default::default()
    };
    let tcp = Flow {
        proto: 6,
        dst_port: 53,
        bytes: 10,
        packets: 1,
        dst_addr: vec![10, 0, 0, 1],
        ..Default::default()
    };
    metric.account(&dns);
    metric.account(&plain_udp);
    metric.account(&tcp);

    // udp database saw both udp flows, dns only the one on port 53;
    // the tcp flow never descended into the tree
    assert_eq!(databases[0].len(), 1); // one address key
    assert_eq!(databases[1].len(), 1);
    let udp_record = databases[0].record("10.0.0.1");
    udp_record.rotate(1, 1, 0, 0);
    assert!(udp_record.above_threshold());
}
