//! The `branch` segment: if/then/else over three embedded pipelines.
//!
//! Incoming flows feed the `condition` pipeline unconditionally. Flows
//! the condition passes move on to `then`; flows it *drops* move on to
//! `else`. Inside a condition, dropping is the else-signal, not an
//! error, so segments meant for use there must not use the drop
//! side-band to mean failure. Edits made to a flow inside the condition
//! persist on both paths.
//!
//! Outputs of `then` and `else` merge into the branch output; their
//! drops merge into the branch drop side-band, unless `bypass-messages`
//! reroutes them to the output. Empty sub-pipeline lists behave as a
//! single pass segment.
//!
//! ```yaml
//! - segment: branch
//!   if:
//!   - segment: flowfilter
//!     config:
//!       filter: proto tcp
//!   then:
//!   - segment: dropfields
//!     config: { policy: drop, fields: InIf }
//!   else:
//!   - segment: dropfields
//!     config: { policy: drop, fields: OutIf }
//! ```

use async_trait::async_trait;

use crate::pipeline::Pipeline;
use crate::segment::{Segment, SegmentIo, ShutdownHandle};

/// Control-flow segment owning three nested pipelines.
///
/// Constructed directly by the builder rather than through the
/// registry, because only the builder can recurse into the
/// `if`/`then`/`else` spec lists.
pub struct Branch {
    condition: Pipeline,
    then_branch: Pipeline,
    else_branch: Pipeline,
    bypass_messages: bool,
}

impl Branch {
    pub fn new(
        condition: Pipeline,
        then_branch: Pipeline,
        else_branch: Pipeline,
        bypass_messages: bool,
    ) -> Self {
        Self {
            condition,
            then_branch,
            else_branch,
            bypass_messages,
        }
    }
}

#[async_trait]
impl Segment for Branch {
    fn name(&self) -> &'static str {
        "branch"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        let Branch {
            mut condition,
            mut then_branch,
            mut else_branch,
            bypass_messages,
        } = *self;
        let SegmentIo { rx, tx, drops } = io;

        let condition_in = condition.input();
        let condition_out = condition.output();
        let condition_drop = condition.drops();
        let then_in = then_branch.input();
        let then_out = then_branch.output();
        let then_drop = then_branch.drops();
        let else_in = else_branch.input();
        let else_out = else_branch.output();
        let else_drop = else_branch.drops();

        condition.start();
        then_branch.start();
        else_branch.start();

        // our input feeds the condition unconditionally; once it ends,
        // drain the condition so the forwarder sees its channels close
        let feeder = tokio::spawn(async move {
            while let Ok(flow) = rx.recv().await {
                if condition_in.send(flow).await.is_err() {
                    break;
                }
            }
            drop(condition_in);
            condition.close().await;
        });

        // condition output selects then, condition drop selects else
        let forwarder = tokio::spawn(async move {
            let mut out_open = true;
            let mut drop_open = true;
            while out_open || drop_open {
                tokio::select! {
                    flow = condition_out.recv(), if out_open => match flow {
                        Ok(flow) => {
                            let _ = then_in.send(flow).await;
                        }
                        Err(_) => out_open = false,
                    },
                    flow = condition_drop.recv(), if drop_open => match flow {
                        Ok(flow) => {
                            let _ = else_in.send(flow).await;
                        }
                        Err(_) => drop_open = false,
                    },
                }
            }
            drop(then_in);
            drop(else_in);
            then_branch.close().await;
            else_branch.close().await;
        });

        // merge both branch outputs (and their drops) into our own
        let merger = tokio::spawn(async move {
            let mut open = [true; 4];
            while open.iter().any(|&o| o) {
                tokio::select! {
                    flow = then_out.recv(), if open[0] => match flow {
                        Ok(flow) => {
                            let _ = tx.send(flow).await;
                        }
                        Err(_) => open[0] = false,
                    },
                    flow = else_out.recv(), if open[1] => match flow {
                        Ok(flow) => {
                            let _ = tx.send(flow).await;
                        }
                        Err(_) => open[1] = false,
                    },
                    flow = then_drop.recv(), if open[2] => match flow {
                        Ok(flow) => {
                            if bypass_messages {
                                let _ = tx.send(flow).await;
                            } else if let Some(drops) = &drops {
                                let _ = drops.send(flow).await;
                            }
                        }
                        Err(_) => open[2] = false,
                    },
                    flow = else_drop.recv(), if open[3] => match flow {
                        Ok(flow) => {
                            if bypass_messages {
                                let _ = tx.send(flow).await;
                            } else if let Some(drops) = &drops {
                                let _ = drops.send(flow).await;
                            }
                        }
                        Err(_) => open[3] = false,
                    },
                }
            }
        });

        let _ = feeder.await;
        let _ = forwarder.await;
        let _ = merger.await;
    }
}
