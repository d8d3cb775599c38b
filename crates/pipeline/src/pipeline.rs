//! The assembled pipeline object.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::segment::{
    flow_channel, FlowReceiver, FlowSender, Passthrough, Segment, SegmentIo, ShutdownHandle,
};
use crate::SEGMENT_CHANNEL_SIZE;

/// One wired-but-unstarted segment.
#[derive(Debug)]
pub(crate) struct Stage {
    pub name: &'static str,
    pub segment: Box<dyn Segment>,
    pub io: SegmentIo,
}

/// A chain of segments with exposed input, output and drop channels.
///
/// Built unstarted so that a `branch` can embed pipelines and start
/// them inside its own task. `close` drops the pipeline's input sender,
/// cancels the per-segment token to wake blocked sources, and waits for
/// every segment to finish flushing.
#[derive(Debug)]
pub struct Pipeline {
    input: Option<FlowSender>,
    output: FlowReceiver,
    drops: FlowReceiver,
    drop_tx: Option<FlowSender>,
    stages: Vec<Stage>,
    supervisor: Option<JoinHandle<()>>,
    drain_tasks: Vec<JoinHandle<()>>,
    segment_token: CancellationToken,
    pipeline_token: CancellationToken,
}

impl Pipeline {
    /// Wire segments into a chain; the flag on each entry marks
    /// filter-capable segments, which get a sender into the
    /// pipeline-level drop aggregate. An empty list yields an identity
    /// pipeline.
    pub(crate) fn assemble(
        segments: Vec<(&'static str, Box<dyn Segment>, bool)>,
        pipeline_token: CancellationToken,
    ) -> Self {
        let segments: Vec<(&'static str, Box<dyn Segment>, bool)> = if segments.is_empty() {
            vec![("pass", Box::new(Passthrough), false)]
        } else {
            segments
        };

        let (input_tx, mut prev_rx) = flow_channel(SEGMENT_CHANNEL_SIZE);
        let (drop_tx, drop_rx) = flow_channel(SEGMENT_CHANNEL_SIZE);

        let mut stages = Vec::with_capacity(segments.len());
        for (name, segment, is_filter) in segments {
            let (tx, rx) = flow_channel(SEGMENT_CHANNEL_SIZE);
            let io = SegmentIo {
                rx: prev_rx,
                tx,
                drops: is_filter.then(|| drop_tx.clone()),
            };
            prev_rx = rx;
            stages.push(Stage { name, segment, io });
        }

        Self {
            input: Some(input_tx),
            output: prev_rx,
            drops: drop_rx,
            drop_tx: Some(drop_tx),
            stages,
            supervisor: None,
            drain_tasks: Vec::new(),
            segment_token: CancellationToken::new(),
            pipeline_token,
        }
    }

    /// Sender into the first segment. Clones share the same channel.
    ///
    /// # Panics
    /// Panics when called after `close`.
    pub fn input(&self) -> FlowSender {
        self.input.as_ref().expect("pipeline input closed").clone()
    }

    /// Receiver on the last segment's output.
    pub fn output(&self) -> FlowReceiver {
        self.output.clone()
    }

    /// Receiver on the aggregated drop side-band. Consume it (or call
    /// `auto_drain`) when the pipeline contains filter segments,
    /// otherwise dropped flows exert backpressure.
    pub fn drops(&self) -> FlowReceiver {
        self.drops.clone()
    }

    /// Token cancelled when a segment requests process shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.pipeline_token.clone()
    }

    /// Number of segments in this pipeline.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no segments (never true for assembled
    /// pipelines, which synthesize a pass segment).
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Spawn one task per segment plus a supervisor that closes the
    /// drop aggregate once every segment finished.
    pub fn start(&mut self) {
        let mut handles = Vec::with_capacity(self.stages.len());
        for stage in self.stages.drain(..) {
            let shutdown =
                ShutdownHandle::new(self.segment_token.clone(), self.pipeline_token.clone());
            let name = stage.name;
            let segment = stage.segment;
            let io = stage.io;
            handles.push(tokio::spawn(async move {
                tracing::debug!(segment = name, "segment starting");
                segment.run(io, shutdown).await;
                tracing::debug!(segment = name, "segment stopped");
            }));
        }

        let drop_tx = self.drop_tx.take();
        self.supervisor = Some(tokio::spawn(async move {
            for handle in handles {
                let _ = handle.await;
            }
            drop(drop_tx);
        }));
    }

    /// Discard everything arriving on the output and drop channels.
    pub fn auto_drain(&mut self) {
        let output = self.output.clone();
        self.drain_tasks.push(tokio::spawn(async move {
            while output.recv().await.is_ok() {}
        }));
        let drops = self.drops.clone();
        self.drain_tasks.push(tokio::spawn(async move {
            while drops.recv().await.is_ok() {}
        }));
    }

    /// Close the pipeline input and wait for all segments to drain and
    /// stop. Safe to call more than once.
    pub async fn close(&mut self) {
        self.input.take();
        self.segment_token.cancel();
        if let Some(supervisor) = self.supervisor.take() {
            let _ = supervisor.await;
        }
        for task in self.drain_tasks.drain(..) {
            let _ = task.await;
        }
    }
}
