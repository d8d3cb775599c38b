//! The `protomap` segment fills the human-readable protocol name from
//! the numeric protocol field.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_pipeline::{Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle};

#[cfg(test)]
#[path = "protomap_test.rs"]
mod tests;

pub struct Protomap;

/// IANA protocol numbers for the protocols that actually show up in
/// flow exports; everything else keeps its number as the name.
fn proto_name(proto: u32) -> String {
    match proto {
        1 => "ICMP".to_string(),
        2 => "IGMP".to_string(),
        4 => "IPv4".to_string(),
        6 => "TCP".to_string(),
        17 => "UDP".to_string(),
        41 => "IPv6".to_string(),
        46 => "RSVP".to_string(),
        47 => "GRE".to_string(),
        50 => "ESP".to_string(),
        51 => "AH".to_string(),
        58 => "IPv6-ICMP".to_string(),
        89 => "OSPFIGP".to_string(),
        94 => "IPIP".to_string(),
        112 => "VRRP".to_string(),
        132 => "SCTP".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Segment for Protomap {
    fn name(&self) -> &'static str {
        "protomap"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(mut flow) = io.rx.recv().await {
            if flow.proto_name.is_empty() {
                flow.proto_name = proto_name(flow.proto);
            }
            if !io.forward(flow).await {
                break;
            }
        }
    }
}

pub struct ProtomapFactory;

impl SegmentFactory for ProtomapFactory {
    fn create(&self, _config: &SegmentConfig, _args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(Protomap))
    }

    fn name(&self) -> &'static str {
        "protomap"
    }
}
