//! Tests for the dropfields segment

use super::*;
use flowline_pipeline::testing::run_segment;

fn make(policy: &str, fields: &str) -> Result<Box<dyn Segment>> {
    DropFieldsFactory.create(
        &SegmentConfig::from_pairs([("policy", policy), ("fields", fields)]),
        &[],
    )
}

#[tokio::test]
async fn test_drop_policy_clears_listed_fields() {
    let segment = make("drop", "InIf").unwrap();
    let flow = Flow {
        proto: 6,
        in_if: 1,
        out_if: 1,
        ..Default::default()
    };
    let (out, _) = run_segment(segment, vec![flow]).await;
    assert_eq!(out[0].in_if, 0);
    assert_eq!(out[0].out_if, 1);
    assert_eq!(out[0].proto, 6);
}

#[tokio::test]
async fn test_keep_policy_retains_only_listed_fields() {
    let segment = make("keep", "Proto,Bytes").unwrap();
    let flow = Flow {
        proto: 17,
        bytes: 900,
        packets: 4,
        in_if: 3,
        ..Default::default()
    };
    let (out, _) = run_segment(segment, vec![flow]).await;
    assert_eq!(out[0].proto, 17);
    assert_eq!(out[0].bytes, 900);
    assert_eq!(out[0].packets, 0);
    assert_eq!(out[0].in_if, 0);
}

#[test]
fn test_unknown_field_fails_construction() {
    assert!(make("drop", "NoSuchField").is_err());
}

#[test]
fn test_bad_policy_fails_construction() {
    assert!(make("sometimes", "Proto").is_err());
}

#[test]
fn test_missing_options_fail_construction() {
    assert!(DropFieldsFactory
        .create(&SegmentConfig::from_pairs([("policy", "drop")]), &[])
        .is_err());
    assert!(DropFieldsFactory
        .create(&SegmentConfig::from_pairs([("fields", "Proto")]), &[])
        .is_err());
}
