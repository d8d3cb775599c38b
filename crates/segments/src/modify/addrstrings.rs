//! The `addrstrings` segment fills the textual address fields
//! (`SourceIP`, `DestinationIP`, `NextHopIP`, `SamplerIP`,
//! `SourceMAC`, `DestinationMAC`) from their raw counterparts, for
//! sinks that want readable output without decoding bytes themselves.

use async_trait::async_trait;
use flowline_config::SegmentConfig;
use flowline_flow::format_mac;
use flowline_pipeline::{Result, Segment, SegmentFactory, SegmentIo, ShutdownHandle};

#[cfg(test)]
#[path = "addrstrings_test.rs"]
mod tests;

pub struct AddrStrings;

#[async_trait]
impl Segment for AddrStrings {
    fn name(&self) -> &'static str {
        "addrstrings"
    }

    async fn run(self: Box<Self>, io: SegmentIo, _shutdown: ShutdownHandle) {
        while let Ok(mut flow) = io.rx.recv().await {
            if flow.source_ip.is_empty() {
                if let Some(ip) = flow.src_ip() {
                    flow.source_ip = ip.to_string();
                }
            }
            if flow.destination_ip.is_empty() {
                if let Some(ip) = flow.dst_ip() {
                    flow.destination_ip = ip.to_string();
                }
            }
            if flow.next_hop_ip.is_empty() {
                if let Some(ip) = flow.next_hop_ip_addr() {
                    flow.next_hop_ip = ip.to_string();
                }
            }
            if flow.sampler_ip.is_empty() {
                if let Some(ip) = flow.sampler_ip_addr() {
                    flow.sampler_ip = ip.to_string();
                }
            }
            if flow.source_mac.is_empty() && flow.src_mac != 0 {
                flow.source_mac = format_mac(flow.src_mac);
            }
            if flow.destination_mac.is_empty() && flow.dst_mac != 0 {
                flow.destination_mac = format_mac(flow.dst_mac);
            }
            if !io.forward(flow).await {
                break;
            }
        }
    }
}

pub struct AddrStringsFactory;

impl SegmentFactory for AddrStringsFactory {
    fn create(&self, _config: &SegmentConfig, _args: &[String]) -> Result<Box<dyn Segment>> {
        Ok(Box::new(AddrStrings))
    }

    fn name(&self) -> &'static str {
        "addrstrings"
    }
}
