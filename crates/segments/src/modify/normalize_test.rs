//! Tests for the normalize segment

use super::*;
use flowline_flow::Flow;
use flowline_pipeline::testing::run_segment;

fn make(fallback: &str) -> Box<dyn Segment> {
    NormalizeFactory
        .create(&SegmentConfig::from_pairs([("fallback", fallback)]), &[])
        .unwrap()
}

#[tokio::test]
async fn test_scales_by_sampling_rate() {
    let flow = Flow {
        bytes: 100,
        packets: 2,
        sampling_rate: 32,
        ..Default::default()
    };
    let (out, _) = run_segment(make("0"), vec![flow]).await;
    assert_eq!(out[0].bytes, 3200);
    assert_eq!(out[0].packets, 64);
    assert_eq!(out[0].normalized, Normalized::Normalized);
}

#[tokio::test]
async fn test_fallback_rate() {
    let flow = Flow {
        bytes: 10,
        packets: 1,
        ..Default::default()
    };
    let (out, _) = run_segment(make("100"), vec![flow]).await;
    assert_eq!(out[0].bytes, 1000);
    assert_eq!(out[0].sampling_rate, 100);
}

#[tokio::test]
async fn test_without_rate_passes_unchanged() {
    let flow = Flow {
        bytes: 10,
        packets: 1,
        ..Default::default()
    };
    let (out, _) = run_segment(make("0"), vec![flow]).await;
    assert_eq!(out[0].bytes, 10);
    assert_eq!(out[0].normalized, Normalized::NotNormalized);
}

#[tokio::test]
async fn test_already_normalized_is_not_scaled_twice() {
    let flow = Flow {
        bytes: 3200,
        packets: 64,
        sampling_rate: 32,
        normalized: Normalized::Normalized,
        ..Default::default()
    };
    let (out, _) = run_segment(make("0"), vec![flow]).await;
    assert_eq!(out[0].bytes, 3200);
    assert_eq!(out[0].packets, 64);
}
