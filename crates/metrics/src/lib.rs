//! Flowline - Accounting metrics
//!
//! The sliding-window top-talkers database and its Prometheus exposure.
//!
//! # Overview
//!
//! Traffic is accounted per address (or address pair) into circular
//! bucket arrays. A rotation ticker advances the current bucket every
//! `bucketduration` seconds and re-evaluates a bps/pps threshold over
//! the most recent buckets; only records above threshold are exposed on
//! scrape. A slower cleanup ticker eventually removes records whose
//! whole window went quiet.
//!
//! Two Prometheus registries are served from one HTTP server: a meta
//! registry (flow counter, database size) on the metrics path and the
//! accounting registry (`traffic_bps`/`traffic_pps` with
//! `{traffic_type, address, forwarding_status}` labels) on the flowdata
//! path.
//!
//! # Concurrency
//!
//! The database holds its record map behind a read-write lock; counter
//! arrays sit behind a per-record mutex, and the exposure flag is an
//! atomic so scrapes never contend with appends. Rotation takes the map
//! read side only briefly and does per-record work under the record
//! locks.

mod collector;
mod database;
mod error;
mod exporter;
mod params;
mod window;

pub use collector::TrafficCollector;
pub use database::{account_keys, Database};
pub use error::MetricsError;
pub use exporter::FlowExporter;
pub use params::{ExporterParams, WindowParams};
pub use window::{Record, RecordRates};

/// Result type for metrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;
