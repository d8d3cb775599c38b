//! The `remoteaddress` segment marks which side of a flow is the
//! remote one, based on the flow direction reported by the exporter.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `policy` | required | `border` derives the remote side from the flow direction, `clear` resets the marker |
//!
//! With the `border` policy an incoming flow's remote side is the
//! source and an outgoing flow's remote side is the destination, the
//! view of an exporter sitting at the network border.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_flow::RemoteAddrSide;
use flowline_pipeline::{
    required, PipelineError, Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle,
};

#[cfg(test)]
#[path = "remoteaddress_test.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Border,
    Clear,
}

pub struct RemoteAddress {
    policy: Policy,
}

#[async_trait]
impl Segment for RemoteAddress {
    fn name(&self) -> &'static str {
        "remoteaddress"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(mut flow) = io.rx.recv().await {
            flow.remote_addr = match self.policy {
                Policy::Border => {
                    if flow.flow_direction == 0 {
                        RemoteAddrSide::Src
                    } else {
                        RemoteAddrSide::Dst
                    }
                }
                Policy::Clear => RemoteAddrSide::Neither,
            };
            if !io.forward(flow).await {
                break;
            }
        }
    }
}

pub struct RemoteAddressFactory;

impl SegmentFactory for RemoteAddressFactory {
    fn create(&self, config: &SegmentConfig, args: &[String]) -> Result<Box<dyn Segment>> {
        let opts = config.expanded(args);
        let policy = match required(&opts, "policy", self.name())?.as_str() {
            "border" => Policy::Border,
            "clear" => Policy::Clear,
            other => {
                return Err(PipelineError::construction(
                    self.name(),
                    format!("policy must be 'border' or 'clear', got '{other}'"),
                ))
            }
        };
        Ok(Box::new(RemoteAddress { policy }))
    }

    fn name(&self) -> &'static str {
        "remoteaddress"
    }
}
