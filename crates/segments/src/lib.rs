//! Flowline - Built-in segments
//!
//! Home of all built-in pipeline segment implementations. Every segment
//! lives in its own module, implements the [`Segment`] trait from
//! `flowline-pipeline` and ships a factory that
//! [`default_registry`] registers under the segment's config name.
//!
//! # Segment groups
//!
//! - `input` - sources: `stdin`, plus the watermark-controlled
//!   `diskbuffer`
//! - `modify` - in-place transforms: `dropfields`, `sync_timestamps`,
//!   `normalize`, `addrstrings`, `protomap`, `remoteaddress`
//! - `filter` - drop-capable segments: `flowfilter`, `drop`
//! - `analysis` - stateful accounting: `toptalkers_metrics`,
//!   `traffic_specific_toptalkers`
//! - `output` - sinks (pass-through by contract): `json`, `csv`
//! - `print` - `count`
//! - `pass` - the identity segment
//!
//! The `branch` control-flow segment is not here: it embeds nested
//! pipelines and is therefore constructed by the pipeline builder
//! itself.

pub mod analysis;
pub mod filter;
pub mod input;
pub mod modify;
pub mod output;
pub mod pass;
pub mod print;

use flowline_pipeline::SegmentRegistry;

// re-exported so segment users don't need the pipeline crate in scope
pub use flowline_pipeline::{Segment, SegmentFactory};

/// Create a registry with every built-in segment registered.
pub fn default_registry() -> SegmentRegistry {
    let mut registry = SegmentRegistry::new();
    registry.register(pass::PassFactory);
    registry.register(print::count::CountFactory);
    registry.register(input::stdin::StdInFactory);
    registry.register(input::diskbuffer::DiskBufferFactory);
    registry.register(modify::dropfields::DropFieldsFactory);
    registry.register(modify::sync_timestamps::SyncTimestampsFactory);
    registry.register(modify::normalize::NormalizeFactory);
    registry.register(modify::addrstrings::AddrStringsFactory);
    registry.register(modify::protomap::ProtomapFactory);
    registry.register(modify::remoteaddress::RemoteAddressFactory);
    registry.register(filter::flowfilter::FlowFilterFactory);
    registry.register(filter::drop::DropFactory);
    registry.register(analysis::toptalkers::ToptalkersMetricsFactory);
    registry.register(analysis::traffic_specific::TrafficSpecificFactory);
    registry.register(output::json::JsonFactory);
    registry.register(output::csv::CsvFactory);
    registry
}
