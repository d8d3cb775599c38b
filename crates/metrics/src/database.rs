//! The accounting database: keyed window records plus its tickers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flowline_config::EvaluationMode;
use flowline_flow::Flow;
use parking_lot::{Mutex, RwLock};
use prometheus::IntGauge;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::params::WindowParams;
use crate::window::Record;

#[cfg(test)]
#[path = "database_test.rs"]
mod tests;

/// Map from accounting key to window record.
///
/// Keys are `"<traffic_type>: <address>"` so several databases can
/// share one exporter without colliding. The map sits behind a
/// read-write lock; appends only take the read side once the record
/// exists.
pub struct Database {
    params: WindowParams,
    records: RwLock<HashMap<String, Arc<Record>>>,
    cleanup_counter: Mutex<usize>,
    db_size: Option<IntGauge>,
}

impl Database {
    /// Create an empty database. `db_size` is updated on every cleanup
    /// tick when present.
    pub fn new(params: WindowParams, db_size: Option<IntGauge>) -> Self {
        let cleanup_counter = params.buckets * params.cleanup_window_sizes;
        Self {
            params,
            records: RwLock::new(HashMap::new()),
            cleanup_counter: Mutex::new(cleanup_counter),
            db_size,
        }
    }

    /// The parameters this database was created with.
    pub fn params(&self) -> &WindowParams {
        &self.params
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no record exists yet.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Fetch the record for `address`, creating it on first sight.
    pub fn record(&self, address: &str) -> Arc<Record> {
        let key = format!("{}: {}", self.params.traffic_type, address);
        if let Some(record) = self.records.read().get(&key) {
            return Arc::clone(record);
        }
        let mut records = self.records.write();
        Arc::clone(records.entry(key).or_insert_with(|| {
            Arc::new(Record::new(self.params.report_buckets, address))
        }))
    }

    /// Account one flow under `address`.
    pub fn append(&self, address: &str, flow: &Flow) -> Arc<Record> {
        let record = self.record(address);
        record.append(flow.bytes, flow.packets, flow.is_forwarded());
        record
    }

    /// Snapshot of all records for scrape-time iteration.
    pub fn records(&self) -> Vec<Arc<Record>> {
        self.records.read().values().map(Arc::clone).collect()
    }

    /// One rotation tick: advance every record's window and re-evaluate
    /// its threshold flag.
    pub fn rotate_all(&self) {
        let records = self.records.read();
        for record in records.values() {
            record.rotate(
                self.params.threshold_buckets,
                self.params.bucket_duration,
                self.params.threshold_bps,
                self.params.threshold_pps,
            );
        }
    }

    /// One cleanup tick. The removal counter starts at
    /// `cleanup_window_sizes * buckets` and decrements per tick; when
    /// it reaches zero, records with an all-zero window are removed.
    /// The size gauge is refreshed on every tick.
    pub fn cleanup_tick(&self) {
        let mut counter = self.cleanup_counter.lock();
        *counter = counter.saturating_sub(1);
        if *counter == 0 {
            *counter = self.params.buckets * self.params.cleanup_window_sizes;
            drop(counter);
            let mut records = self.records.write();
            let before = records.len();
            records.retain(|_, record| !record.is_empty());
            let removed = before - records.len();
            if removed > 0 {
                tracing::debug!(
                    traffic_type = %self.params.traffic_type,
                    removed,
                    remaining = records.len(),
                    "removed idle accounting records"
                );
            }
        }
        if let Some(gauge) = &self.db_size {
            gauge.set(self.len() as i64);
        }
    }

    /// Spawn the rotation and cleanup tickers. Both stop when `token`
    /// is cancelled (segment shutdown).
    pub fn start_tickers(self: &Arc<Self>, token: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(2);

        let clock_db = Arc::clone(self);
        let clock_token = token.clone();
        tasks.push(tokio::spawn(async move {
            let period = Duration::from_secs(clock_db.params.bucket_duration);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately, skip it
            loop {
                tokio::select! {
                    _ = ticker.tick() => clock_db.rotate_all(),
                    _ = clock_token.cancelled() => return,
                }
            }
        }));

        let cleanup_db = Arc::clone(self);
        let cleanup_token = token.clone();
        tasks.push(tokio::spawn(async move {
            let period = Duration::from_secs(cleanup_db.params.window_secs().max(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => cleanup_db.cleanup_tick(),
                    _ = cleanup_token.cancelled() => return,
                }
            }
        }));

        tasks
    }
}

/// The accounting key(s) a flow yields under an evaluation mode.
pub fn account_keys(flow: &Flow, mode: EvaluationMode) -> Vec<String> {
    match mode {
        EvaluationMode::Source => vec![flow.src_addr_string()],
        EvaluationMode::Destination => vec![flow.dst_addr_string()],
        EvaluationMode::SourceAndDestination => {
            vec![flow.src_addr_string(), flow.dst_addr_string()]
        }
        EvaluationMode::Connection => {
            vec![format!(
                "{} -> {}",
                flow.src_addr_string(),
                flow.dst_addr_string()
            )]
        }
    }
}
