//! The wide flow record and its direct accessors.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::codec::{b64, is_false, is_zero_u32, is_zero_u64};

#[cfg(test)]
#[path = "flow_test.rs"]
mod tests;

/// Which collection mechanism produced a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowType {
    #[default]
    FlowUnknown,
    SflowSample,
    NetflowV5,
    NetflowV9,
    Ipfix,
    Ebpf,
}

impl FlowType {
    pub fn is_unknown(&self) -> bool {
        *self == FlowType::FlowUnknown
    }
}

/// RPKI validation result attached by a BGP enrichment segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    #[default]
    ValidationUnknown,
    Valid,
    NotFound,
    Invalid,
}

impl ValidationStatus {
    pub fn is_unknown(&self) -> bool {
        *self == ValidationStatus::ValidationUnknown
    }
}

/// Whether a normalize segment already applied the sampling rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Normalized {
    #[default]
    NotNormalized,
    Normalized,
}

impl Normalized {
    pub fn is_unknown(&self) -> bool {
        *self == Normalized::NotNormalized
    }
}

/// Which side of the flow is the remote one, as decided by the
/// `remoteaddress` segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteAddrSide {
    #[default]
    Neither,
    Src,
    Dst,
}

impl RemoteAddrSide {
    pub fn is_unknown(&self) -> bool {
        *self == RemoteAddrSide::Neither
    }
}

/// Anonymization applied to an address field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddrAnon {
    #[default]
    NotAnonymized,
    CryptoPan,
}

impl AddrAnon {
    pub fn is_unknown(&self) -> bool {
        *self == AddrAnon::NotAnonymized
    }
}

/// A single flow record.
///
/// Fields are grouped roughly as they arrive: the decoder fills the
/// identity/volumetric/L3-L4 groups, modify segments fill the
/// enrichment tail. All fields default to zero values; the JSON codec
/// omits zero values on encode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flow {
    #[serde(rename = "type", skip_serializing_if = "FlowType::is_unknown")]
    pub flow_type: FlowType,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub time_received: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub time_received_ns: u64,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub sequence_num: u32,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub sampling_rate: u64,
    /// 0 = incoming, 1 = outgoing, from the exporter's point of view
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub flow_direction: u32,
    #[serde(with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub sampler_address: Vec<u8>,

    // Temporal extent. Each event carries seconds, milliseconds and
    // nanoseconds; sync_missing_timestamps keeps them consistent.
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub time_flow_start: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub time_flow_start_ms: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub time_flow_start_ns: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub time_flow_end: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub time_flow_end_ms: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub time_flow_end_ns: u64,

    // Volumetrics, raw as observed unless `normalized` says otherwise.
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub bytes: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub packets: u64,

    // Identity
    #[serde(with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub src_addr: Vec<u8>,
    #[serde(with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub dst_addr: Vec<u8>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub etype: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub proto: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub src_port: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub dst_port: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub in_if: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub out_if: u32,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub src_mac: u64,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub dst_mac: u64,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub src_vlan: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub dst_vlan: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub vlan_id: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub ingress_vrf_id: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub egress_vrf_id: u32,

    // L3/L4 decode
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub ip_tos: u32,
    /// High bits classify the flow: 0b01 forwarded, 0b10 dropped,
    /// 0b11 consumed by the sampler.
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub forwarding_status: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub ip_ttl: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub tcp_flags: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub icmp_type: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub icmp_code: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub ipv6_flow_label: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub fragment_id: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub fragment_offset: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub bi_flow_direction: u32,

    // Routing
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub src_as: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub dst_as: u32,
    #[serde(with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub next_hop: Vec<u8>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub next_hop_as: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub src_net: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub dst_net: u32,

    // MPLS
    #[serde(skip_serializing_if = "is_false")]
    pub has_mpls: bool,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_count: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_1_ttl: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_1_label: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_2_ttl: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_2_label: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_3_ttl: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_3_label: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_last_ttl: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub mpls_last_label: u32,

    // Enrichment
    #[serde(skip_serializing_if = "String::is_empty")]
    pub src_country: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dst_country: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub as_path: Vec<u32>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub med: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub local_pref: u32,
    #[serde(skip_serializing_if = "ValidationStatus::is_unknown")]
    pub validation_status: ValidationStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub remote_country: String,
    #[serde(skip_serializing_if = "Normalized::is_unknown")]
    pub normalized: Normalized,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub proto_name: String,
    #[serde(skip_serializing_if = "RemoteAddrSide::is_unknown")]
    pub remote_addr: RemoteAddrSide,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub src_host_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dst_host_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_hop_host_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub src_as_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dst_as_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_hop_as_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sampler_host_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub src_if_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub src_if_desc: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub src_if_speed: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dst_if_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dst_if_desc: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub dst_if_speed: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub cid: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cid_string: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub src_cid: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub dst_cid: u32,

    // Anonymization metadata
    #[serde(skip_serializing_if = "AddrAnon::is_unknown")]
    pub src_addr_anon: AddrAnon,
    #[serde(skip_serializing_if = "AddrAnon::is_unknown")]
    pub dst_addr_anon: AddrAnon,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub src_addr_preserved_len: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub dst_addr_preserved_len: u32,
    #[serde(skip_serializing_if = "AddrAnon::is_unknown")]
    pub sampler_addr_anon: AddrAnon,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub sampler_addr_preserved_prefix_len: u32,

    // Textual forms, filled by `addrstrings`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub destination_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_hop_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sampler_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_mac: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub destination_mac: String,
}

impl Flow {
    /// Whether the forwarding status classifies this flow as forwarded
    /// (status high bits 0b01).
    #[inline]
    pub fn is_forwarded(&self) -> bool {
        self.forwarding_status & 0b1100_0000 == 0b0100_0000
    }

    /// Whether the forwarding status classifies this flow as dropped
    /// (status high bits 0b10).
    #[inline]
    pub fn is_dropped(&self) -> bool {
        self.forwarding_status & 0b1100_0000 == 0b1000_0000
    }

    /// Whether the flow was consumed by the sampler itself (0b11).
    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.forwarding_status & 0b1100_0000 == 0b1100_0000
    }

    /// Source address as an `IpAddr`, if the raw bytes are 4 or 16 long.
    pub fn src_ip(&self) -> Option<IpAddr> {
        ip_from_bytes(&self.src_addr)
    }

    /// Destination address as an `IpAddr`.
    pub fn dst_ip(&self) -> Option<IpAddr> {
        ip_from_bytes(&self.dst_addr)
    }

    /// Sampler (exporting router) address as an `IpAddr`.
    pub fn sampler_ip_addr(&self) -> Option<IpAddr> {
        ip_from_bytes(&self.sampler_address)
    }

    /// Next-hop address as an `IpAddr`.
    pub fn next_hop_ip_addr(&self) -> Option<IpAddr> {
        ip_from_bytes(&self.next_hop)
    }

    /// Source address label for accounting keys; falls back to the raw
    /// byte rendering when the length is unexpected.
    pub fn src_addr_string(&self) -> String {
        addr_string(&self.src_addr)
    }

    /// Destination address label for accounting keys.
    pub fn dst_addr_string(&self) -> String {
        addr_string(&self.dst_addr)
    }

    /// Flow duration in seconds, as end minus start.
    ///
    /// Returns 0 when the timestamps are absent or inverted; rate
    /// computations substitute 1 for a zero duration.
    pub fn duration_secs(&self) -> u64 {
        self.time_flow_end.saturating_sub(self.time_flow_start)
    }

    /// Fill empty timestamp slots from their populated siblings.
    ///
    /// Seconds are derived from nanoseconds first, then milliseconds;
    /// milliseconds from nanoseconds, then seconds; nanoseconds from
    /// milliseconds, then seconds. Received time only has second and
    /// nanosecond slots. Conversions round half-up and never overwrite a
    /// non-zero slot, which makes this idempotent.
    pub fn sync_missing_timestamps(&mut self) {
        fill_time_with_fallback(
            &mut self.time_flow_end,
            self.time_flow_end_ns,
            1e-9,
            self.time_flow_end_ms,
            1e-3,
        );
        fill_time_with_fallback(
            &mut self.time_flow_end_ms,
            self.time_flow_end_ns,
            1e-6,
            self.time_flow_end,
            1e3,
        );
        fill_time_with_fallback(
            &mut self.time_flow_end_ns,
            self.time_flow_end_ms,
            1e6,
            self.time_flow_end,
            1e9,
        );

        fill_time_with_fallback(
            &mut self.time_flow_start,
            self.time_flow_start_ns,
            1e-9,
            self.time_flow_start_ms,
            1e-3,
        );
        fill_time_with_fallback(
            &mut self.time_flow_start_ms,
            self.time_flow_start_ns,
            1e-6,
            self.time_flow_start,
            1e3,
        );
        fill_time_with_fallback(
            &mut self.time_flow_start_ns,
            self.time_flow_start_ms,
            1e6,
            self.time_flow_start,
            1e9,
        );

        fill_time(&mut self.time_received, self.time_received_ns, 1e-9);
        fill_time(&mut self.time_received_ns, self.time_received, 1e9);
    }
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}

fn addr_string(bytes: &[u8]) -> String {
    match ip_from_bytes(bytes) {
        Some(ip) => ip.to_string(),
        None => format!("{:02x?}", bytes),
    }
}

/// Render a MAC address stored in the low 48 bits of a u64.
pub fn format_mac(mac: u64) -> String {
    let b = mac.to_be_bytes();
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        b[2], b[3], b[4], b[5], b[6], b[7]
    )
}

fn fill_time(slot: &mut u64, source: u64, factor: f64) {
    if *slot != 0 {
        return;
    }
    if source != 0 {
        *slot = (source as f64 * factor).round() as u64;
    }
}

fn fill_time_with_fallback(slot: &mut u64, primary: u64, pf: f64, fallback: u64, ff: f64) {
    fill_time(slot, primary, pf);
    fill_time(slot, fallback, ff);
}
