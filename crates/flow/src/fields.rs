//! Static field table for field-name-driven segments.
//!
//! The original configuration surface addresses flow fields by their
//! wire names (`SrcAddr`, `InIf`, ...). Instead of reflecting over the
//! struct, a macro generates one match arm per field for clearing,
//! copying and formatting, so unknown names can be rejected when a
//! segment is constructed.

use base64::prelude::{Engine, BASE64_STANDARD};

use crate::flow::{AddrAnon, Flow, FlowType, Normalized, RemoteAddrSide, ValidationStatus};

#[cfg(test)]
#[path = "fields_test.rs"]
mod tests;

/// Rendering of a single field value for textual sinks (csv).
pub trait FieldFmt {
    fn format(&self) -> String;
}

impl FieldFmt for u32 {
    fn format(&self) -> String {
        self.to_string()
    }
}

impl FieldFmt for u64 {
    fn format(&self) -> String {
        self.to_string()
    }
}

impl FieldFmt for bool {
    fn format(&self) -> String {
        self.to_string()
    }
}

impl FieldFmt for String {
    fn format(&self) -> String {
        self.clone()
    }
}

impl FieldFmt for Vec<u8> {
    fn format(&self) -> String {
        BASE64_STANDARD.encode(self)
    }
}

impl FieldFmt for Vec<u32> {
    fn format(&self) -> String {
        self.iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FieldFmt for FlowType {
    fn format(&self) -> String {
        format!("{:?}", self)
    }
}

impl FieldFmt for ValidationStatus {
    fn format(&self) -> String {
        format!("{:?}", self)
    }
}

impl FieldFmt for Normalized {
    fn format(&self) -> String {
        format!("{:?}", self)
    }
}

impl FieldFmt for RemoteAddrSide {
    fn format(&self) -> String {
        format!("{:?}", self)
    }
}

impl FieldFmt for AddrAnon {
    fn format(&self) -> String {
        format!("{:?}", self)
    }
}

macro_rules! flow_fields {
    ( $( $field:ident => $name:literal ),+ $(,)? ) => {
        impl Flow {
            /// All addressable field names, in declaration order.
            pub const FIELD_NAMES: &'static [&'static str] = &[ $( $name ),+ ];

            /// Whether `name` addresses a known field.
            pub fn has_field(name: &str) -> bool {
                Self::FIELD_NAMES.contains(&name)
            }

            /// Reset the named field to its zero value. Returns false
            /// for unknown names.
            pub fn clear_field(&mut self, name: &str) -> bool {
                match name {
                    $( $name => { self.$field = Default::default(); true } )+
                    _ => false,
                }
            }

            /// Copy the named field into `target`. Returns false for
            /// unknown names.
            pub fn copy_field(&self, name: &str, target: &mut Flow) -> bool {
                match name {
                    $( $name => { target.$field = self.$field.clone(); true } )+
                    _ => false,
                }
            }

            /// Render the named field for textual output.
            pub fn format_field(&self, name: &str) -> Option<String> {
                match name {
                    $( $name => Some(FieldFmt::format(&self.$field)), )+
                    _ => None,
                }
            }
        }
    };
}

flow_fields! {
    flow_type => "Type",
    time_received => "TimeReceived",
    time_received_ns => "TimeReceivedNs",
    sequence_num => "SequenceNum",
    sampling_rate => "SamplingRate",
    flow_direction => "FlowDirection",
    sampler_address => "SamplerAddress",
    time_flow_start => "TimeFlowStart",
    time_flow_start_ms => "TimeFlowStartMs",
    time_flow_start_ns => "TimeFlowStartNs",
    time_flow_end => "TimeFlowEnd",
    time_flow_end_ms => "TimeFlowEndMs",
    time_flow_end_ns => "TimeFlowEndNs",
    bytes => "Bytes",
    packets => "Packets",
    src_addr => "SrcAddr",
    dst_addr => "DstAddr",
    etype => "Etype",
    proto => "Proto",
    src_port => "SrcPort",
    dst_port => "DstPort",
    in_if => "InIf",
    out_if => "OutIf",
    src_mac => "SrcMac",
    dst_mac => "DstMac",
    src_vlan => "SrcVlan",
    dst_vlan => "DstVlan",
    vlan_id => "VlanId",
    ingress_vrf_id => "IngressVrfId",
    egress_vrf_id => "EgressVrfId",
    ip_tos => "IpTos",
    forwarding_status => "ForwardingStatus",
    ip_ttl => "IpTtl",
    tcp_flags => "TcpFlags",
    icmp_type => "IcmpType",
    icmp_code => "IcmpCode",
    ipv6_flow_label => "Ipv6FlowLabel",
    fragment_id => "FragmentId",
    fragment_offset => "FragmentOffset",
    bi_flow_direction => "BiFlowDirection",
    src_as => "SrcAs",
    dst_as => "DstAs",
    next_hop => "NextHop",
    next_hop_as => "NextHopAs",
    src_net => "SrcNet",
    dst_net => "DstNet",
    has_mpls => "HasMpls",
    mpls_count => "MplsCount",
    mpls_1_ttl => "Mpls1Ttl",
    mpls_1_label => "Mpls1Label",
    mpls_2_ttl => "Mpls2Ttl",
    mpls_2_label => "Mpls2Label",
    mpls_3_ttl => "Mpls3Ttl",
    mpls_3_label => "Mpls3Label",
    mpls_last_ttl => "MplsLastTtl",
    mpls_last_label => "MplsLastLabel",
    src_country => "SrcCountry",
    dst_country => "DstCountry",
    as_path => "AsPath",
    med => "Med",
    local_pref => "LocalPref",
    validation_status => "ValidationStatus",
    remote_country => "RemoteCountry",
    normalized => "Normalized",
    proto_name => "ProtoName",
    remote_addr => "RemoteAddr",
    src_host_name => "SrcHostName",
    dst_host_name => "DstHostName",
    next_hop_host_name => "NextHopHostName",
    src_as_name => "SrcAsName",
    dst_as_name => "DstAsName",
    next_hop_as_name => "NextHopAsName",
    sampler_host_name => "SamplerHostName",
    src_if_name => "SrcIfName",
    src_if_desc => "SrcIfDesc",
    src_if_speed => "SrcIfSpeed",
    dst_if_name => "DstIfName",
    dst_if_desc => "DstIfDesc",
    dst_if_speed => "DstIfSpeed",
    note => "Note",
    cid => "Cid",
    cid_string => "CidString",
    src_cid => "SrcCid",
    dst_cid => "DstCid",
    src_addr_anon => "SrcAddrAnon",
    dst_addr_anon => "DstAddrAnon",
    src_addr_preserved_len => "SrcAddrPreservedLen",
    dst_addr_preserved_len => "DstAddrPreservedLen",
    sampler_addr_anon => "SamplerAddrAnon",
    sampler_addr_preserved_prefix_len => "SamplerAddrPreservedPrefixLen",
    source_ip => "SourceIP",
    destination_ip => "DestinationIP",
    next_hop_ip => "NextHopIP",
    sampler_ip => "SamplerIP",
    source_mac => "SourceMAC",
    destination_mac => "DestinationMAC",
}
