//! End-to-end tests for pipeline assembly, branch and parallel
//! semantics, using purpose-built test segments.

use std::time::Duration;

use async_trait::async_trait;
use flowline_config::{specs_from_yaml, SegmentConfig};
use flowline_flow::{Flow, FlowType};
use tokio::time::timeout;

use crate::error::Result;
use crate::registry::{SegmentFactory, SegmentRegistry};
use crate::segment::{Segment, SegmentIo, ShutdownHandle};
use crate::build;

/// Forwards everything untouched.
struct PassSegment;

#[async_trait]
impl Segment for PassSegment {
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

struct PassFactory;

impl SegmentFactory for PassFactory {
    fn create(&self, _config: &SegmentConfig, _args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(PassSegment))
    }

    fn name(&self) -> &'static str {
        "pass"
    }
}

/// Passes TCP flows, drops the rest.
struct TcpOnlySegment;

#[async_trait]
impl Segment for TcpOnlySegment {
    fn name(&self) -> &'static str {
        "tcponly"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(flow) = io.rx.recv().await {
            if flow.proto == 6 {
                if !io.forward(flow).await {
                    break;
                }
            } else {
                io.drop_flow(flow).await;
            }
        }
    }
}

struct TcpOnlyFactory;

impl SegmentFactory for TcpOnlyFactory {
    fn create(&self, _config: &SegmentConfig, _args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(TcpOnlySegment))
    }

    fn name(&self) -> &'static str {
        "tcponly"
    }

    fn is_filter(&self) -> bool {
        true
    }
}

/// Stamps the configured note onto every flow.
struct NoteSegment {
    note: String,
}

#[async_trait]
impl Segment for NoteSegment {
    fn name(&self) -> &'static str {
        "note"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(mut flow) = io.rx.recv().await {
            flow.note = self.note.clone();
            if !io.forward(flow).await {
                break;
            }
        }
    }
}

struct NoteFactory;

impl SegmentFactory for NoteFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(NoteSegment {
            note: config.get_expanded("note", args).unwrap_or_default(),
        }))
    }

    fn name(&self) -> &'static str {
        "note"
    }
}

/// Drops every flow.
struct BlackholeSegment;

#[async_trait]
impl Segment for BlackholeSegment {
    fn name(&self) -> &'static str {
        "blackhole"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(flow) = io.rx.recv().await {
            io.drop_flow(flow).await;
        }
    }
}

struct BlackholeFactory;

impl SegmentFactory for BlackholeFactory {
    fn create(&self, _config: &SegmentConfig, _args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(BlackholeSegment))
    }

    fn name(&self) -> &'static str {
        "blackhole"
    }

    fn is_filter(&self) -> bool {
        true
    }
}

fn test_registry() -> SegmentRegistry {
    let mut registry = SegmentRegistry::new();
    registry.register(PassFactory);
    registry.register(TcpOnlyFactory);
    registry.register(NoteFactory);
    registry.register(BlackholeFactory);
    registry
}

async fn collect_n(rx: &crate::FlowReceiver, n: usize) -> Vec<Flow> {
    let mut flows = Vec::with_capacity(n);
    for _ in 0..n {
        match timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Ok(flow)) => flows.push(*flow),
            other => panic!("expected a flow, got {other:?}"),
        }
    }
    flows
}

#[tokio::test]
async fn test_identity_pipeline() {
    let specs = specs_from_yaml("- segment: pass").unwrap();
    let mut pipeline = build(&specs, &test_registry(), &[]).unwrap();
    let input = pipeline.input();
    let output = pipeline.output();
    pipeline.start();

    let flow = Flow {
        flow_type: FlowType::NetflowV9,
        ..Default::default()
    };
    input.send(Box::new(flow)).await.unwrap();

    let got = collect_n(&output, 1).await;
    assert_eq!(got[0].flow_type, FlowType::NetflowV9);

    drop(input);
    pipeline.close().await;
}

#[tokio::test]
async fn test_pipeline_teardown_does_not_hang() {
    let specs = specs_from_yaml("- segment: pass\n- segment: pass").unwrap();
    let mut pipeline = build(&specs, &test_registry(), &[]).unwrap();
    let input = pipeline.input();
    pipeline.start();
    pipeline.auto_drain();

    input.send(Box::new(Flow::default())).await.unwrap();
    drop(input);

    timeout(Duration::from_secs(5), pipeline.close())
        .await
        .expect("pipeline close should finish");
}

#[tokio::test]
async fn test_ordered_when_single_jobs() {
    let specs = specs_from_yaml("- segment: pass\n- segment: pass\n- segment: pass").unwrap();
    let mut pipeline = build(&specs, &test_registry(), &[]).unwrap();
    let input = pipeline.input();
    let output = pipeline.output();
    pipeline.start();

    let feeder = tokio::spawn(async move {
        for i in 0..100u32 {
            let flow = Flow {
                sequence_num: i,
                ..Default::default()
            };
            input.send(Box::new(flow)).await.unwrap();
        }
    });

    let got = collect_n(&output, 100).await;
    let sequence: Vec<u32> = got.iter().map(|f| f.sequence_num).collect();
    assert_eq!(sequence, (0..100).collect::<Vec<u32>>());

    feeder.await.unwrap();
    pipeline.close().await;
}

#[tokio::test]
async fn test_parallel_preserves_multiset_not_order() {
    let specs = specs_from_yaml("- segment: pass\n  jobs: 4").unwrap();
    let mut pipeline = build(&specs, &test_registry(), &[]).unwrap();
    let input = pipeline.input();
    let output = pipeline.output();
    pipeline.start();

    const COUNT: u32 = 10_000;
    let feeder = tokio::spawn(async move {
        for i in 0..COUNT {
            let flow = Flow {
                sequence_num: i,
                ..Default::default()
            };
            input.send(Box::new(flow)).await.unwrap();
        }
    });

    let collector = tokio::spawn(async move {
        let mut seen = Vec::with_capacity(COUNT as usize);
        while let Ok(flow) = output.recv().await {
            seen.push(flow.sequence_num);
            if seen.len() == COUNT as usize {
                break;
            }
        }
        seen
    });

    feeder.await.unwrap();
    let mut seen = timeout(Duration::from_secs(30), collector)
        .await
        .expect("all flows arrive")
        .unwrap();
    seen.sort_unstable();
    assert_eq!(seen, (0..COUNT).collect::<Vec<u32>>());

    pipeline.close().await;
}

#[tokio::test]
async fn test_branch_routes_then_and_else() {
    let specs = specs_from_yaml(
        r#"
- segment: branch
  if:
  - segment: tcponly
  then:
  - segment: note
    config: { note: "then" }
  else:
  - segment: note
    config: { note: "else" }
"#,
    )
    .unwrap();
    let mut pipeline = build(&specs, &test_registry(), &[]).unwrap();
    let input = pipeline.input();
    let output = pipeline.output();
    pipeline.start();

    let tcp = Flow {
        proto: 6,
        sequence_num: 1,
        ..Default::default()
    };
    let other = Flow {
        proto: 42,
        sequence_num: 2,
        ..Default::default()
    };
    input.send(Box::new(tcp)).await.unwrap();
    input.send(Box::new(other)).await.unwrap();

    let mut got = collect_n(&output, 2).await;
    got.sort_by_key(|f| f.sequence_num);

    // every input appears exactly once across then/else
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].note, "then");
    assert_eq!(got[1].note, "else");

    drop(input);
    pipeline.close().await;
}

#[tokio::test]
async fn test_branch_with_empty_subpipelines_is_identity() {
    let specs = specs_from_yaml("- segment: branch").unwrap();
    let mut pipeline = build(&specs, &test_registry(), &[]).unwrap();
    let input = pipeline.input();
    let output = pipeline.output();
    pipeline.start();

    let flow = Flow {
        sequence_num: 9,
        ..Default::default()
    };
    input.send(Box::new(flow)).await.unwrap();

    let got = collect_n(&output, 1).await;
    assert_eq!(got[0].sequence_num, 9);

    drop(input);
    pipeline.close().await;
}

#[tokio::test]
async fn test_branch_inner_drops_go_to_drop_aggregate() {
    let specs = specs_from_yaml(
        r#"
- segment: branch
  if:
  - segment: tcponly
  else:
  - segment: blackhole
"#,
    )
    .unwrap();
    let mut pipeline = build(&specs, &test_registry(), &[]).unwrap();
    let input = pipeline.input();
    let output = pipeline.output();
    let drops = pipeline.drops();
    pipeline.start();

    input
        .send(Box::new(Flow {
            proto: 6,
            ..Default::default()
        }))
        .await
        .unwrap();
    input
        .send(Box::new(Flow {
            proto: 17,
            ..Default::default()
        }))
        .await
        .unwrap();

    // tcp passes through the empty then-path
    let got = collect_n(&output, 1).await;
    assert_eq!(got[0].proto, 6);
    // udp went to else, was dropped there, surfaces on the aggregate
    let dropped = collect_n(&drops, 1).await;
    assert_eq!(dropped[0].proto, 17);

    drop(input);
    pipeline.close().await;
}

#[tokio::test]
async fn test_branch_bypass_messages_reroutes_drops() {
    let specs = specs_from_yaml(
        r#"
- segment: branch
  config:
    bypass-messages: true
  if:
  - segment: tcponly
  else:
  - segment: blackhole
"#,
    )
    .unwrap();
    let mut pipeline = build(&specs, &test_registry(), &[]).unwrap();
    let input = pipeline.input();
    let output = pipeline.output();
    pipeline.start();

    input
        .send(Box::new(Flow {
            proto: 17,
            ..Default::default()
        }))
        .await
        .unwrap();

    // dropped inside else, but bypass forwards it downstream
    let got = collect_n(&output, 1).await;
    assert_eq!(got[0].proto, 17);

    drop(input);
    pipeline.close().await;
}

#[tokio::test]
async fn test_branch_rejects_parallel_jobs() {
    let specs = specs_from_yaml("- segment: branch\n  jobs: 2").unwrap();
    let err = build(&specs, &test_registry(), &[]).unwrap_err();
    assert!(err.to_string().contains("jobs"), "{err}");
}

#[tokio::test]
async fn test_unknown_segment_fails_build() {
    let specs = specs_from_yaml("- segment: florb").unwrap();
    assert!(build(&specs, &test_registry(), &[]).is_err());
}

#[tokio::test]
async fn test_config_expansion_reaches_factories() {
    let specs = specs_from_yaml("- segment: note\n  config: { note: \"$0\" }").unwrap();
    let args = vec!["expanded".to_string()];
    let mut pipeline = build(&specs, &test_registry(), &args).unwrap();
    let input = pipeline.input();
    let output = pipeline.output();
    pipeline.start();

    input.send(Box::new(Flow::default())).await.unwrap();
    let got = collect_n(&output, 1).await;
    assert_eq!(got[0].note, "expanded");

    drop(input);
    pipeline.close().await;
}

#[tokio::test]
async fn test_run_segment_helper() {
    let (out, drops) = crate::testing::run_segment(
        Box::new(TcpOnlySegment),
        vec![
            Flow {
                proto: 6,
                ..Default::default()
            },
            Flow {
                proto: 17,
                ..Default::default()
            },
        ],
    )
    .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].proto, 6);
    assert_eq!(drops.len(), 1);
    assert_eq!(drops[0].proto, 17);
}
