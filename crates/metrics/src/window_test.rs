//! Tests for the bucketed window record

use super::*;

#[test]
fn test_append_accumulates_into_current_bucket() {
    let record = Record::new(3, "10.0.0.1");
    record.append(100, 2, true);
    record.append(50, 1, true);
    record.append(70, 3, false);

    let (fwd_bytes, fwd_packets, drop_bytes, drop_packets) = record.current_bucket();
    assert_eq!(fwd_bytes, 150);
    assert_eq!(fwd_packets, 3);
    assert_eq!(drop_bytes, 70);
    assert_eq!(drop_packets, 3);
}

#[test]
fn test_rotation_zeroes_new_bucket_and_keeps_history() {
    let record = Record::new(3, "10.0.0.1");
    record.append(100, 1, true);
    record.rotate(3, 1, 0, 0);

    // new current bucket is clean
    assert_eq!(record.current_bucket(), (0, 0, 0, 0));
    // the appended sums are still visible over the window
    let rates = record.rates(3, 1);
    assert_eq!(rates.fwd_bps, 100.0 * 8.0 / 3.0);
}

#[test]
fn test_threshold_crossing() {
    // bucketduration=1, buckets=3, thresholdbps=800, thresholdpps=0:
    // 3 x 200 bytes/1 packet gives 1600 bps > 800 and 1 pps > 0
    let record = Record::new(3, "192.0.2.1");
    for _ in 0..3 {
        record.append(200, 1, true);
    }
    record.rotate(3, 1, 800, 0);
    assert!(record.above_threshold());
}

#[test]
fn test_threshold_not_crossed() {
    let record = Record::new(3, "192.0.2.1");
    record.append(200, 1, true);
    record.rotate(3, 1, 800, 0);
    // 200 * 8 / 3 = 533 bps
    assert!(!record.above_threshold());
}

#[test]
fn test_threshold_requires_both_dimensions() {
    let record = Record::new(1, "192.0.2.1");
    record.append(10_000, 1, true);
    // bps passes, pps threshold of 5 does not (1 pps)
    record.rotate(1, 1, 800, 5);
    assert!(!record.above_threshold());
}

#[test]
fn test_threshold_counts_dropped_traffic_too() {
    let record = Record::new(2, "192.0.2.1");
    record.append(500, 4, false);
    record.rotate(1, 1, 800, 0);
    // 500 * 8 / 1 = 4000 bps of dropped traffic
    assert!(record.above_threshold());
}

#[test]
fn test_zero_threshold_buckets_means_whole_window() {
    let record = Record::new(4, "192.0.2.1");
    record.append(400, 4, true);
    record.rotate(0, 1, 0, 0);
    assert!(record.above_threshold());

    let rates = record.rates(0, 1);
    assert_eq!(rates.fwd_bps, 400.0 * 8.0 / 4.0);
}

#[test]
fn test_pointer_wraps_modulo_window() {
    let record = Record::new(3, "192.0.2.1");
    // more rotations than buckets; old data gets recycled away
    record.append(100, 1, true);
    for _ in 0..7 {
        record.rotate(3, 1, 0, 0);
    }
    assert!(record.is_empty());
}

#[test]
fn test_rotation_idempotent_on_zero_record() {
    let record = Record::new(3, "192.0.2.1");
    record.rotate(3, 1, 100, 100);
    assert!(record.is_empty());
    assert!(!record.above_threshold());
    record.rotate(3, 1, 100, 100);
    assert!(record.is_empty());
    assert!(!record.above_threshold());
}

#[test]
fn test_rates_split_forwarded_and_dropped() {
    let record = Record::new(2, "192.0.2.1");
    record.append(100, 1, true);
    record.append(300, 3, false);
    record.rotate(2, 1, 0, 0);

    let rates = record.rates(2, 1);
    assert_eq!(rates.fwd_bps, 100.0 * 8.0 / 2.0);
    assert_eq!(rates.fwd_pps, 1.0 / 2.0);
    assert_eq!(rates.drop_bps, 300.0 * 8.0 / 2.0);
    assert_eq!(rates.drop_pps, 3.0 / 2.0);
}
