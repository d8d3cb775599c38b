//! The segment contract: channels, lifecycle and shutdown handles.

use async_trait::async_trait;
use crossfire::{MAsyncRx, MAsyncTx};
use flowline_flow::Flow;
use tokio_util::sync::CancellationToken;

/// Flows travel boxed; a segment owns the box exclusively until it
/// enqueues it downstream.
pub type FlowBox = Box<Flow>;

/// Sending half of a segment link
pub type FlowSender = MAsyncTx<FlowBox>;

/// Receiving half of a segment link
pub type FlowReceiver = MAsyncRx<FlowBox>;

/// Create a bounded segment link.
///
/// MPMC on both ends: senders merge, receivers compete (each message is
/// delivered to exactly one receiver), which is what branch merging and
/// parallel fan-out are built on.
pub fn flow_channel(capacity: usize) -> (FlowSender, FlowReceiver) {
    crossfire::mpmc::bounded_async(capacity)
}

/// The channels a segment operates on.
///
/// Wired once by the pipeline builder before `run`. Dropping `tx` (and
/// `drops`) is how a segment closes its outputs; `run` does that
/// implicitly by returning.
#[derive(Clone, Debug)]
pub struct SegmentIo {
    /// Incoming flows; closed when every upstream sender is gone
    pub rx: FlowReceiver,
    /// Outgoing flows
    pub tx: FlowSender,
    /// Side-band for rejected flows, present on filter-capable segments
    /// when something downstream subscribed to them
    pub drops: Option<FlowSender>,
}

impl SegmentIo {
    /// Send a flow downstream. Returns false when the downstream side
    /// is gone, which a segment should treat like an input close.
    pub async fn forward(&self, flow: FlowBox) -> bool {
        self.tx.send(flow).await.is_ok()
    }

    /// Send a flow to the drop side-band, discarding it when nothing
    /// subscribed. Dropping into a branch condition routes the flow to
    /// the `else` pipeline; it is a routing signal, not an error.
    pub async fn drop_flow(&self, flow: FlowBox) {
        if let Some(drops) = &self.drops {
            let _ = drops.send(flow).await;
        }
    }
}

/// Cooperative termination handles passed to every segment.
#[derive(Clone)]
pub struct ShutdownHandle {
    segment: CancellationToken,
    pipeline: CancellationToken,
}

impl ShutdownHandle {
    pub fn new(segment: CancellationToken, pipeline: CancellationToken) -> Self {
        Self { segment, pipeline }
    }

    /// Pending until this segment is asked to close. Source-like
    /// segments select on this to wake blocked reads; segments driven
    /// by their input channel can ignore it.
    pub async fn closed(&self) {
        self.segment.cancelled().await
    }

    /// Whether close was already requested.
    pub fn is_closed(&self) -> bool {
        self.segment.is_cancelled()
    }

    /// Ask the enclosing process to shut the whole pipeline down, e.g.
    /// when a bounded replay source reaches EOF.
    pub fn shutdown_pipeline(&self) {
        self.pipeline.cancel();
    }

    /// Token observed by the process entry point for shutdown requests.
    pub fn pipeline_token(&self) -> CancellationToken {
        self.pipeline.clone()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new(CancellationToken::new(), CancellationToken::new())
    }
}

/// A pipeline segment.
///
/// `run` consumes `io.rx` until it closes, produces on `io.tx` and
/// optionally `io.drops`, and closes its outputs by returning (all
/// channel halves it holds are dropped). Segments that spawn helper
/// tasks must join them before returning so outputs only close once
/// everything is flushed.
#[async_trait]
pub trait Segment: Send {
    /// Registry name of this segment, used for logging.
    fn name(&self) -> &'static str;

    /// Process flows until the input closes or shutdown is requested.
    async fn run(self: Box<Self>, io: SegmentIo, shutdown: ShutdownHandle);
}

impl std::fmt::Debug for dyn Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Segment").field(&self.name()).finish()
    }
}

/// The identity segment used for empty (sub-)pipelines.
pub(crate) struct Passthrough;

#[async_trait]
impl Segment for Passthrough {
    fn name(&self) -> &'static str {
        "pass"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(flow) = io.rx.recv().await {
            if !io.forward(flow).await {
                break;
            }
        }
    }
}
