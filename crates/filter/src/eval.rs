//! Bottom-up evaluation of filter expressions against a flow.

use std::net::IpAddr;

use flowline_flow::{Flow, Normalized};

use crate::ast::*;
use crate::error::FilterError;

#[cfg(test)]
#[path = "eval_test.rs"]
mod tests;

/// Evaluate `expr` against `flow`.
///
/// Children are evaluated before their parents combine; both sides of a
/// conjunction are always visited so semantic errors surface regardless
/// of the boolean outcome. The empty expression matches everything.
pub fn evaluate(expr: &Expression, flow: &Flow) -> Result<bool, FilterError> {
    let left = match &expr.left {
        None => return Ok(true),
        Some(statement) => statement_result(statement, flow)?,
    };
    match (expr.conjunction, &expr.right) {
        (None, _) => Ok(left),
        (Some(conjunction), Some(right)) => {
            let right = evaluate(right, flow)?;
            Ok(match conjunction {
                Conjunction::And => left && right,
                Conjunction::Or => left || right,
            })
        }
        (Some(_), None) => Err(FilterError::semantic(
            "conjunction without a right-hand side",
        )),
    }
}

fn statement_result(statement: &Statement, flow: &Flow) -> Result<bool, FilterError> {
    let result = match &statement.kind {
        StatementKind::Directional { direction, matcher } => {
            let (src, dst) = directional_result(matcher, flow)?;
            match (direction, matcher) {
                // an unqualified cid also matches the flow-level cid
                (None, DirectionalMatcher::Cid(range)) => {
                    src || dst || range.matches(u64::from(flow.cid))?
                }
                (None, _) => src || dst,
                (Some(Direction::Src), _) => src,
                (Some(Direction::Dst), _) => dst,
            }
        }
        StatementKind::Regular(matcher) => regular_result(matcher, flow)?,
        StatementKind::Sub(sub) => evaluate(sub, flow)?,
    };
    Ok(result != statement.negated)
}

/// Evaluate both readings of a directional matcher.
fn directional_result(
    matcher: &DirectionalMatcher,
    flow: &Flow,
) -> Result<(bool, bool), FilterError> {
    let result = match matcher {
        DirectionalMatcher::Address { address, prefix } => match prefix {
            Some(bits) => (
                cidr_contains(*address, *bits, flow.src_ip()),
                cidr_contains(*address, *bits, flow.dst_ip()),
            ),
            None => (
                ip_equal(flow.src_ip(), *address),
                ip_equal(flow.dst_ip(), *address),
            ),
        },
        DirectionalMatcher::Interface(matcher) => match matcher {
            InterfaceMatcher::Id(id) => (flow.in_if == *id, flow.out_if == *id),
            InterfaceMatcher::Name(name) => (
                contains_insensitive(&flow.src_if_name, name),
                contains_insensitive(&flow.dst_if_name, name),
            ),
            InterfaceMatcher::Description(desc) => (
                contains_insensitive(&flow.src_if_desc, desc),
                contains_insensitive(&flow.dst_if_desc, desc),
            ),
            InterfaceMatcher::Speed(range) => (
                range.matches(u64::from(flow.src_if_speed) / 1000)?,
                range.matches(u64::from(flow.dst_if_speed) / 1000)?,
            ),
        },
        DirectionalMatcher::Port(range) => (
            range.matches(u64::from(flow.src_port))?,
            range.matches(u64::from(flow.dst_port))?,
        ),
        DirectionalMatcher::Asn(range) => (
            range.matches(u64::from(flow.src_as))?,
            range.matches(u64::from(flow.dst_as))?,
        ),
        DirectionalMatcher::Netsize(range) => (
            range.matches(u64::from(flow.src_net))?,
            range.matches(u64::from(flow.dst_net))?,
        ),
        DirectionalMatcher::Cid(range) => (
            range.matches(u64::from(flow.src_cid))?,
            range.matches(u64::from(flow.dst_cid))?,
        ),
        DirectionalMatcher::Vrf(range) => (
            range.matches(u64::from(flow.ingress_vrf_id))?,
            range.matches(u64::from(flow.egress_vrf_id))?,
        ),
    };
    Ok(result)
}

fn regular_result(matcher: &RegularMatcher, flow: &Flow) -> Result<bool, FilterError> {
    let result = match matcher {
        RegularMatcher::Router(address) => ip_equal(flow.sampler_ip_addr(), *address),
        RegularMatcher::NextHop(address) => ip_equal(flow.next_hop_ip_addr(), *address),
        RegularMatcher::NextHopAsn(asn) => flow.next_hop_as == *asn,
        RegularMatcher::Bytes(range) => range.matches(flow.bytes)?,
        RegularMatcher::Packets(range) => range.matches(flow.packets)?,
        RegularMatcher::RemoteCountry(code) => flow.remote_country.contains(code),
        RegularMatcher::FlowDirection(dir) => match dir {
            FlowDir::Incoming => flow.flow_direction == 0,
            FlowDir::Outgoing => flow.flow_direction == 1,
        },
        RegularMatcher::Normalized => flow.normalized == Normalized::Normalized,
        RegularMatcher::Duration(range) => range.matches(flow.duration_secs())?,
        RegularMatcher::Etype(etype) => flow.etype == *etype,
        RegularMatcher::Proto(proto) => flow.proto == *proto,
        RegularMatcher::Status(matcher) => match matcher {
            StatusMatcher::Value(value) => flow.forwarding_status == *value,
            StatusMatcher::Key(key) => flow.forwarding_status & key == *key,
        },
        RegularMatcher::TcpFlags(matcher) => {
            if flow.proto != 6 {
                return Ok(false);
            }
            match matcher {
                TcpFlagsMatcher::Value(value) => flow.tcp_flags == *value,
                TcpFlagsMatcher::Key(key) => flow.tcp_flags & key == *key,
            }
        }
        RegularMatcher::IpTos(range) => range.matches(u64::from(flow.ip_tos))?,
        RegularMatcher::Dscp(dscp) => flow.ip_tos >> 2 == u32::from(*dscp),
        RegularMatcher::Ecn(ecn) => flow.ip_tos & 0b0000_0011 == u32::from(*ecn),
        RegularMatcher::LocalPref(range) => range.matches(u64::from(flow.local_pref))?,
        RegularMatcher::Med(range) => range.matches(u64::from(flow.med))?,
        RegularMatcher::SamplingRate(range) => range.matches(flow.sampling_rate)?,
        RegularMatcher::Icmp(matcher) => {
            if flow.proto != 1 {
                return Ok(false);
            }
            match matcher {
                IcmpMatcher::Type(value) => icmp_type(flow) == *value,
                IcmpMatcher::Code(value) => icmp_code(flow) == *value,
            }
        }
        RegularMatcher::Bps(range) => {
            let duration = flow.duration_secs().max(1);
            range.matches(flow.bytes * 8 / duration)?
        }
        RegularMatcher::Pps(range) => {
            let duration = flow.duration_secs().max(1);
            range.matches(flow.packets / duration)?
        }
        RegularMatcher::PassesThrough(asns) => {
            flow.as_path.windows(asns.len()).any(|run| run == &asns[..])
        }
        RegularMatcher::Rpki(status) => flow.validation_status == *status,
    };
    Ok(result)
}

/// ICMP type, preferring the decoded field over the port encoding some
/// exporters use.
fn icmp_type(flow: &Flow) -> u32 {
    if flow.icmp_type != 0 {
        flow.icmp_type
    } else {
        flow.dst_port / 256
    }
}

fn icmp_code(flow: &Flow) -> u32 {
    if flow.icmp_code != 0 {
        flow.icmp_code
    } else {
        flow.dst_port % 256
    }
}

fn contains_insensitive(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Fold IPv4-mapped IPv6 addresses so a 16-byte encoding of an IPv4
/// address compares equal to its 4-byte form.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

fn ip_equal(flow_ip: Option<IpAddr>, wanted: IpAddr) -> bool {
    match flow_ip {
        Some(ip) => canonical(ip) == canonical(wanted),
        None => false,
    }
}

fn cidr_contains(network: IpAddr, prefix: u8, flow_ip: Option<IpAddr>) -> bool {
    let Some(ip) = flow_ip else {
        return false;
    };
    match (canonical(network), canonical(ip)) {
        (IpAddr::V4(net), IpAddr::V4(ip)) => {
            prefix_match(&net.octets(), &ip.octets(), prefix.min(32))
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) => {
            prefix_match(&net.octets(), &ip.octets(), prefix.min(128))
        }
        _ => false,
    }
}

fn prefix_match(network: &[u8], addr: &[u8], prefix: u8) -> bool {
    let full_bytes = usize::from(prefix / 8);
    if network[..full_bytes] != addr[..full_bytes] {
        return false;
    }
    let remainder = prefix % 8;
    if remainder == 0 {
        return true;
    }
    let mask = !0u8 << (8 - remainder);
    network[full_bytes] & mask == addr[full_bytes] & mask
}
