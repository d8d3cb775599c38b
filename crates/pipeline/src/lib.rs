//! Flowline - Pipeline runtime
//!
//! The async runtime that wires segments into a pipeline via channels.
//!
//! # Architecture
//!
//! ```text
//! [Sources]            [Transforms/Filters]              [Sinks]
//!    stdin ──→ rx ──→ [segment] ──→ [segment] ──→ ... ──→ json
//!                          │ drops
//!                          └──────────→ pipeline drop aggregate
//! ```
//!
//! # Key design
//!
//! - **Channel-based**: segments are connected by bounded MPMC channels
//!   (`crossfire`); each segment runs in its own tokio task.
//! - **Backpressure**: links are capacity-1, so flow rate is set by the
//!   slowest downstream segment.
//! - **Drop side-band**: filter-capable segments get a sender into the
//!   pipeline-level drop aggregate; inside a `branch` condition the drop
//!   signal selects the `else` path instead.
//! - **Recursive assembly**: a `branch` spec embeds three nested
//!   pipelines built by the same routine.
//! - **Parallel fan-out**: `jobs: N` wraps a segment in N instances
//!   sharing input and output channels; each message is won by exactly
//!   one instance, at the cost of ordering.
//! - **Cooperative shutdown**: closing the pipeline input cascades
//!   through the segment chain; a per-pipeline cancellation token wakes
//!   blocked sources, and segments can request a process-wide shutdown
//!   (bounded source reaching EOF).
//!
//! # Example
//!
//! ```ignore
//! let specs = flowline_config::specs_from_yaml(yaml)?;
//! let mut pipeline = flowline_pipeline::build(&specs, &registry, &args)?;
//! pipeline.start();
//! pipeline.auto_drain();
//! // ... feed pipeline.input() or let a source segment produce ...
//! pipeline.close().await;
//! ```

mod branch;
mod builder;
mod error;
mod options;
mod parallel;
mod pipeline;
mod registry;
mod segment;
pub mod testing;

pub use branch::Branch;
pub use builder::build;
pub use error::{PipelineError, Result};
pub use options::{optional, optional_parsed, required};
pub use parallel::Parallel;
pub use pipeline::Pipeline;
pub use registry::{SegmentFactory, SegmentRegistry};
pub use segment::{
    flow_channel, FlowBox, FlowReceiver, FlowSender, Segment, SegmentIo, ShutdownHandle,
};

/// Capacity of the channels linking segments. Kept minimal so that
/// backpressure propagates promptly; segments needing real buffering
/// create their own internal queues.
pub const SEGMENT_CHANNEL_SIZE: usize = 1;

#[cfg(test)]
mod pipeline_test;
