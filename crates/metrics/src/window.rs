//! Per-key bucketed window records.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

#[cfg(test)]
#[path = "window_test.rs"]
mod tests;

/// One accounting record: four circular counter arrays plus the
/// exposure flag.
///
/// Appends and rotation serialize on the record mutex; the threshold
/// flag is atomic so scrape-time readers never take the lock.
pub struct Record {
    address: String,
    above_threshold: AtomicBool,
    buckets: Mutex<Buckets>,
}

struct Buckets {
    fwd_bytes: Vec<u64>,
    fwd_packets: Vec<u64>,
    drop_bytes: Vec<u64>,
    drop_packets: Vec<u64>,
    /// Index of the currently-written bucket
    pointer: usize,
}

/// Forwarded/dropped rates over a number of report buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRates {
    pub fwd_bps: f64,
    pub fwd_pps: f64,
    pub drop_bps: f64,
    pub drop_pps: f64,
}

impl Record {
    /// Create an all-zero record of `window_size` buckets labeled with
    /// `address`.
    pub fn new(window_size: usize, address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            above_threshold: AtomicBool::new(false),
            buckets: Mutex::new(Buckets {
                fwd_bytes: vec![0; window_size],
                fwd_packets: vec![0; window_size],
                drop_bytes: vec![0; window_size],
                drop_packets: vec![0; window_size],
                pointer: 0,
            }),
        }
    }

    /// The textual address used as the metric label.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the last rotation put this record above threshold.
    pub fn above_threshold(&self) -> bool {
        self.above_threshold.load(Ordering::Relaxed)
    }

    /// Accumulate one flow into the current bucket. The forwarded or
    /// dropped pair is selected by the flow's forwarding status.
    pub fn append(&self, bytes: u64, packets: u64, forwarded: bool) {
        let mut buckets = self.buckets.lock();
        let pointer = buckets.pointer;
        if forwarded {
            buckets.fwd_bytes[pointer] += bytes;
            buckets.fwd_packets[pointer] += packets;
        } else {
            buckets.drop_bytes[pointer] += bytes;
            buckets.drop_packets[pointer] += packets;
        }
    }

    /// Whether every bucket of the window is zero.
    pub fn is_empty(&self) -> bool {
        let buckets = self.buckets.lock();
        buckets
            .fwd_packets
            .iter()
            .chain(buckets.drop_packets.iter())
            .all(|&count| count == 0)
    }

    /// Advance the window by one bucket.
    ///
    /// The new current bucket is zeroed only after the threshold was
    /// re-evaluated over the `threshold_buckets` most recent buckets
    /// behind it (forwarded and dropped counted together), so a full
    /// window of history stays intact. `threshold_buckets == 0` means
    /// the whole window. Exposure requires strictly exceeding both
    /// thresholds.
    pub fn rotate(
        &self,
        threshold_buckets: usize,
        bucket_duration: u64,
        threshold_bps: u64,
        threshold_pps: u64,
    ) {
        let mut buckets = self.buckets.lock();
        let capacity = buckets.fwd_bytes.len();
        buckets.pointer = (buckets.pointer + 1) % capacity;

        let lookback = if threshold_buckets == 0 {
            capacity
        } else {
            threshold_buckets.min(capacity)
        };

        let mut sum_bytes = 0u64;
        let mut sum_packets = 0u64;
        let mut pos = buckets.pointer;
        for _ in 0..lookback {
            pos = if pos == 0 { capacity - 1 } else { pos - 1 };
            sum_bytes += buckets.fwd_bytes[pos] + buckets.drop_bytes[pos];
            sum_packets += buckets.fwd_packets[pos] + buckets.drop_packets[pos];
        }

        let span = (bucket_duration * lookback as u64).max(1);
        let bps = sum_bytes * 8 / span;
        let pps = sum_packets / span;
        self.above_threshold
            .store(bps > threshold_bps && pps > threshold_pps, Ordering::Relaxed);

        let pointer = buckets.pointer;
        buckets.fwd_bytes[pointer] = 0;
        buckets.fwd_packets[pointer] = 0;
        buckets.drop_bytes[pointer] = 0;
        buckets.drop_packets[pointer] = 0;
    }

    /// Average rates over the `report_buckets` most recent buckets
    /// behind the current one; 0 means the whole window.
    pub fn rates(&self, report_buckets: usize, bucket_duration: u64) -> RecordRates {
        let buckets = self.buckets.lock();
        let capacity = buckets.fwd_bytes.len();
        let lookback = if report_buckets == 0 {
            capacity
        } else {
            report_buckets.min(capacity)
        };

        let mut fwd_bytes = 0u64;
        let mut fwd_packets = 0u64;
        let mut drop_bytes = 0u64;
        let mut drop_packets = 0u64;
        let mut pos = buckets.pointer;
        for _ in 0..lookback {
            pos = if pos == 0 { capacity - 1 } else { pos - 1 };
            fwd_bytes += buckets.fwd_bytes[pos];
            fwd_packets += buckets.fwd_packets[pos];
            drop_bytes += buckets.drop_bytes[pos];
            drop_packets += buckets.drop_packets[pos];
        }

        let span = (lookback as u64 * bucket_duration) as f64;
        RecordRates {
            fwd_bps: fwd_bytes as f64 * 8.0 / span,
            fwd_pps: fwd_packets as f64 / span,
            drop_bps: drop_bytes as f64 * 8.0 / span,
            drop_pps: drop_packets as f64 / span,
        }
    }

    /// Sum of the current bucket, for tests and debugging.
    #[cfg(test)]
    fn current_bucket(&self) -> (u64, u64, u64, u64) {
        let buckets = self.buckets.lock();
        let pointer = buckets.pointer;
        (
            buckets.fwd_bytes[pointer],
            buckets.fwd_packets[pointer],
            buckets.drop_bytes[pointer],
            buckets.drop_packets[pointer],
        )
    }
}
