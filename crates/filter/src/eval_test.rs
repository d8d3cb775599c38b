//! Tests for filter evaluation

use super::*;
use crate::error::FilterError;
use crate::parser::parse;
use flowline_flow::{Flow, Normalized, ValidationStatus};

fn matches(filter: &str, flow: &Flow) -> bool {
    let expr = parse(filter).expect("filter parses");
    evaluate(&expr, flow).expect("filter evaluates")
}

#[test]
fn test_empty_expression_matches_everything() {
    assert!(matches("", &Flow::default()));
}

#[test]
fn test_src_port_and_not_proto() {
    // source-qualified port plus negated proto
    let filter = "src port 53 and not proto tcp";

    let udp_dns = Flow {
        src_port: 53,
        proto: 17,
        ..Default::default()
    };
    assert!(matches(filter, &udp_dns));

    let tcp_dns = Flow {
        src_port: 53,
        proto: 6,
        ..Default::default()
    };
    assert!(!matches(filter, &tcp_dns));

    let reply = Flow {
        dst_port: 53,
        proto: 17,
        ..Default::default()
    };
    assert!(!matches(filter, &reply));
}

#[test]
fn test_unqualified_port_matches_either_side() {
    let filter = "port 53";
    let src = Flow {
        src_port: 53,
        ..Default::default()
    };
    let dst = Flow {
        dst_port: 53,
        ..Default::default()
    };
    let neither = Flow {
        src_port: 80,
        dst_port: 443,
        ..Default::default()
    };
    assert!(matches(filter, &src));
    assert!(matches(filter, &dst));
    assert!(!matches(filter, &neither));
}

#[test]
fn test_address_equality_and_prefix() {
    let flow = Flow {
        src_addr: vec![10, 1, 2, 3],
        dst_addr: vec![192, 168, 0, 1],
        ..Default::default()
    };

    assert!(matches("src address 10.1.2.3", &flow));
    assert!(!matches("dst address 10.1.2.3", &flow));
    assert!(matches("address 10.0.0.0/8", &flow));
    assert!(matches("dst address 192.168.0.0/16", &flow));
    assert!(!matches("address 172.16.0.0/12", &flow));
}

#[test]
fn test_ipv4_mapped_v6_compares_equal() {
    let mut addr = vec![0u8; 16];
    addr[10] = 0xff;
    addr[11] = 0xff;
    addr[12..16].copy_from_slice(&[10, 1, 2, 3]);
    let flow = Flow {
        src_addr: addr,
        ..Default::default()
    };
    assert!(matches("src address 10.1.2.3", &flow));
    assert!(matches("src address 10.0.0.0/8", &flow));
}

#[test]
fn test_or_combination() {
    let filter = "proto tcp or proto udp";
    let tcp = Flow {
        proto: 6,
        ..Default::default()
    };
    let gre = Flow {
        proto: 47,
        ..Default::default()
    };
    assert!(matches(filter, &tcp));
    assert!(!matches(filter, &gre));
}

#[test]
fn test_bps_substitutes_duration_one() {
    // 1000 bytes in zero seconds reads as 8000 bps
    let flow = Flow {
        bytes: 1000,
        ..Default::default()
    };
    assert!(matches("bps >7000", &flow));
    assert!(!matches("bps <7000", &flow));

    let slow = Flow {
        bytes: 1000,
        time_flow_start: 100,
        time_flow_end: 110,
        ..Default::default()
    };
    assert!(matches("bps 800", &slow));
}

#[test]
fn test_pps_rate() {
    let flow = Flow {
        packets: 50,
        time_flow_start: 0,
        time_flow_end: 0,
        ..Default::default()
    };
    assert!(matches("pps 50", &flow));
}

#[test]
fn test_tcpflags_require_tcp() {
    let syn_scan = Flow {
        proto: 6,
        tcp_flags: 0x02,
        ..Default::default()
    };
    assert!(matches("tcpflags syn", &syn_scan));

    let udp = Flow {
        proto: 17,
        tcp_flags: 0x02,
        ..Default::default()
    };
    assert!(!matches("tcpflags syn", &udp));

    let synack = Flow {
        proto: 6,
        tcp_flags: 0x12,
        ..Default::default()
    };
    assert!(matches("tcpflags syn", &synack));
    assert!(!matches("tcpflags 2", &synack));
}

#[test]
fn test_icmp_matches_use_port_encoding() {
    let echo = Flow {
        proto: 1,
        dst_port: 8 * 256 + 3,
        ..Default::default()
    };
    assert!(matches("icmp type 8", &echo));
    assert!(matches("icmp code 3", &echo));

    let not_icmp = Flow {
        proto: 6,
        dst_port: 8 * 256,
        ..Default::default()
    };
    assert!(!matches("icmp type 8", &not_icmp));
}

#[test]
fn test_status_key_semantics() {
    let forwarded = Flow {
        forwarding_status: 66, // forwarded class, reason bits set
        ..Default::default()
    };
    assert!(matches("status forwarded", &forwarded));
    assert!(!matches("status dropped", &forwarded));
    assert!(matches("status 66", &forwarded));
    assert!(!matches("status 64", &forwarded));
}

#[test]
fn test_dscp_and_ecn_extract_from_tos() {
    let flow = Flow {
        ip_tos: 0b1011_1001, // dscp 46, ecn 1
        ..Default::default()
    };
    assert!(matches("dscp 46", &flow));
    assert!(matches("ecn 1", &flow));
    assert!(!matches("dscp 0", &flow));
}

#[test]
fn test_passes_through_subsequence() {
    let flow = Flow {
        as_path: vec![64496, 64500, 64501, 64502],
        ..Default::default()
    };
    assert!(matches("passes-through 64500 64501", &flow));
    assert!(matches("passes-through 64502", &flow));
    assert!(!matches("passes-through 64501 64500", &flow));
}

#[test]
fn test_rpki_and_normalized() {
    let flow = Flow {
        validation_status: ValidationStatus::Invalid,
        normalized: Normalized::Normalized,
        ..Default::default()
    };
    assert!(matches("rpki invalid", &flow));
    assert!(!matches("rpki valid", &flow));
    assert!(matches("normalized", &flow));
    assert!(!matches("not normalized", &flow));
}

#[test]
fn test_router_match() {
    let flow = Flow {
        sampler_address: vec![10, 0, 0, 254],
        ..Default::default()
    };
    assert!(matches("router 10.0.0.254", &flow));
    assert!(!matches("router 10.0.0.1", &flow));
}

#[test]
fn test_iface_speed_in_mbit() {
    let flow = Flow {
        src_if_speed: 10_000_000, // 10 Gbit/s in kbit/s
        ..Default::default()
    };
    assert!(matches("src iface speed 10000", &flow));
}

#[test]
fn test_reversed_range_is_semantic_error() {
    let expr = parse("bytes 100-1").unwrap();
    let err = evaluate(&expr, &Flow::default()).unwrap_err();
    assert!(matches!(err, FilterError::Semantic(_)));
}

#[test]
fn test_semantic_error_surfaces_through_conjunctions() {
    // the failing range sits behind an `or` that already matched
    let expr = parse("bytes <10 or packets 9-2").unwrap();
    let err = evaluate(&expr, &Flow::default()).unwrap_err();
    assert!(matches!(err, FilterError::Semantic(_)));
}

#[test]
fn test_country_match() {
    let flow = Flow {
        remote_country: "DE".into(),
        ..Default::default()
    };
    assert!(matches("country de", &flow));
    assert!(!matches("country fr", &flow));
}
