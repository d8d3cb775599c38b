//! Parallel fan-out wrapper for `jobs > 1`.

use async_trait::async_trait;

use crate::segment::{Segment, SegmentIo, ShutdownHandle};

/// N instances of the same segment sharing input and output channels.
///
/// The shared input is MPMC, so each flow is won by exactly one
/// instance; there is no broadcast. This scales throughput at the cost
/// of output ordering. Start and stop are collective: the wrapper's
/// outputs only close after every instance finished.
pub struct Parallel {
    name: &'static str,
    inner: Vec<Box<dyn Segment>>,
}

impl Parallel {
    /// Wrap `inner` instances under the wrapped segment's name.
    ///
    /// # Panics
    /// Panics on an empty instance list; the builder always constructs
    /// at least one.
    pub fn new(name: &'static str, inner: Vec<Box<dyn Segment>>) -> Self {
        assert!(!inner.is_empty(), "parallel wrapper needs instances");
        Self { name, inner }
    }

    /// Number of wrapped instances.
    pub fn jobs(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl Segment for Parallel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(self: Box<Self>, io: SegmentIo, shutdown: ShutdownHandle) {
        let Parallel { name, inner } = *self;
        let jobs = inner.len();
        tracing::debug!(segment = name, jobs, "parallel fan-out starting");

        let mut handles = Vec::with_capacity(jobs);
        for segment in inner {
            let io = io.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(segment.run(io, shutdown)));
        }
        // the wrapper's own clones must go before the join, otherwise
        // the shared output never closes
        drop(io);

        for handle in handles {
            let _ = handle.await;
        }
        tracing::debug!(segment = name, jobs, "parallel fan-out stopped");
    }
}
