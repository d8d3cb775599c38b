//! Helpers for running single segments in tests.

use flowline_flow::Flow;

use crate::segment::{flow_channel, Segment, SegmentIo, ShutdownHandle};

/// Run one segment over a finite input and collect its outputs and
/// drops.
///
/// The channels are sized to hold everything, so the segment never
/// blocks and the call completes once its `run` returns. Not suitable
/// for source-like segments that only stop on cancellation.
pub async fn run_segment(
    segment: Box<dyn Segment>,
    input: Vec<Flow>,
) -> (Vec<Flow>, Vec<Flow>) {
    let capacity = input.len() + 8;
    let (in_tx, in_rx) = flow_channel(capacity);
    let (out_tx, out_rx) = flow_channel(capacity);
    let (drop_tx, drop_rx) = flow_channel(capacity);

    for flow in input {
        in_tx
            .send(Box::new(flow))
            .await
            .expect("test input channel open");
    }
    drop(in_tx);

    segment
        .run(
            SegmentIo {
                rx: in_rx,
                tx: out_tx,
                drops: Some(drop_tx),
            },
            ShutdownHandle::default(),
        )
        .await;

    let mut outputs = Vec::new();
    while let Ok(flow) = out_rx.try_recv() {
        outputs.push(*flow);
    }
    let mut drops = Vec::new();
    while let Ok(flow) = drop_rx.try_recv() {
        drops.push(*flow);
    }
    (outputs, drops)
}
