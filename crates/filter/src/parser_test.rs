//! Tests for the filter parser

use super::*;
use crate::ast::*;
use crate::error::FilterError;

fn first_statement(expr: &Expression) -> &Statement {
    expr.left.as_deref().expect("expression has a statement")
}

#[test]
fn test_empty_input_parses_to_empty_expression() {
    assert_eq!(parse("").unwrap(), Expression::default());
    assert_eq!(parse("   ").unwrap(), Expression::default());
}

#[test]
fn test_single_proto_match() {
    let expr = parse("proto tcp").unwrap();
    let statement = first_statement(&expr);
    assert!(!statement.negated);
    assert_eq!(
        statement.kind,
        StatementKind::Regular(RegularMatcher::Proto(6))
    );
}

#[test]
fn test_directional_port() {
    let expr = parse("src port 53").unwrap();
    match &first_statement(&expr).kind {
        StatementKind::Directional { direction, matcher } => {
            assert_eq!(*direction, Some(Direction::Src));
            assert_eq!(*matcher, DirectionalMatcher::Port(NumericRange::Equal(53)));
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_unqualified_directional() {
    let expr = parse("port 53").unwrap();
    match &first_statement(&expr).kind {
        StatementKind::Directional { direction, .. } => assert_eq!(*direction, None),
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_conjunction_is_right_recursive() {
    let expr = parse("proto tcp and port 80 or port 443").unwrap();
    assert_eq!(expr.conjunction, Some(Conjunction::And));
    let right = expr.right.as_deref().unwrap();
    assert_eq!(right.conjunction, Some(Conjunction::Or));
}

#[test]
fn test_negation_and_parentheses() {
    let expr = parse("not (proto tcp or proto udp)").unwrap();
    let statement = first_statement(&expr);
    assert!(statement.negated);
    assert!(matches!(statement.kind, StatementKind::Sub(_)));
}

#[test]
fn test_address_with_prefix() {
    let expr = parse("address 10.0.0.0/8").unwrap();
    match &first_statement(&expr).kind {
        StatementKind::Directional { matcher, .. } => {
            assert_eq!(
                *matcher,
                DirectionalMatcher::Address {
                    address: "10.0.0.0".parse().unwrap(),
                    prefix: Some(8),
                }
            );
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_ipv6_address() {
    let expr = parse("dst address 2001:db8::1").unwrap();
    match &first_statement(&expr).kind {
        StatementKind::Directional { direction, matcher } => {
            assert_eq!(*direction, Some(Direction::Dst));
            assert_eq!(
                *matcher,
                DirectionalMatcher::Address {
                    address: "2001:db8::1".parse().unwrap(),
                    prefix: None,
                }
            );
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_range_forms() {
    let cases = [
        ("port 80", NumericRange::Equal(80)),
        ("port <1024", NumericRange::Below(1024)),
        ("port < 1024", NumericRange::Below(1024)),
        ("port >1024", NumericRange::Above(1024)),
        (
            "port 1024-2048",
            NumericRange::Range {
                lower: 1024,
                upper: 2048,
            },
        ),
    ];
    for (input, expected) in cases {
        let expr = parse(input).unwrap();
        match &first_statement(&expr).kind {
            StatementKind::Directional { matcher, .. } => {
                assert_eq!(*matcher, DirectionalMatcher::Port(expected), "{input}");
            }
            other => panic!("unexpected kind for {input}: {other:?}"),
        }
    }
}

#[test]
fn test_interface_variants() {
    let expr = parse("iface name \"xe-0/0/0\"").unwrap();
    match &first_statement(&expr).kind {
        StatementKind::Directional { matcher, .. } => {
            assert_eq!(
                *matcher,
                DirectionalMatcher::Interface(InterfaceMatcher::Name("xe-0/0/0".into()))
            );
        }
        other => panic!("unexpected kind: {other:?}"),
    }

    let expr = parse("iface 5").unwrap();
    match &first_statement(&expr).kind {
        StatementKind::Directional { matcher, .. } => {
            assert_eq!(
                *matcher,
                DirectionalMatcher::Interface(InterfaceMatcher::Id(5))
            );
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_named_status_and_tcpflags() {
    let expr = parse("status forwarded and tcpflags syn").unwrap();
    match &first_statement(&expr).kind {
        StatementKind::Regular(RegularMatcher::Status(StatusMatcher::Key(key))) => {
            assert_eq!(*key, 64);
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_passes_through_list() {
    let expr = parse("passes-through 64500 64501").unwrap();
    match &first_statement(&expr).kind {
        StatementKind::Regular(RegularMatcher::PassesThrough(asns)) => {
            assert_eq!(asns, &[64500, 64501]);
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_icmp_type() {
    let expr = parse("icmp type 8").unwrap();
    assert_eq!(
        first_statement(&expr).kind,
        StatementKind::Regular(RegularMatcher::Icmp(IcmpMatcher::Type(8)))
    );
}

#[test]
fn test_syntax_errors() {
    assert!(parse("proto").is_err());
    assert!(parse("florb 3").is_err());
    assert!(parse("(proto tcp").is_err());
    assert!(parse("proto tcp extra").is_err());
    assert!(parse("address 300.1.2.3").is_err());
    assert!(parse("address 10.0.0.0/40").is_err());
    assert!(parse("src bytes 100").is_err());
    assert!(parse("dscp 90").is_err());
}

#[test]
fn test_reversed_range_parses_but_fails_semantically() {
    // the parser accepts it, evaluation reports the semantic error
    let expr = parse("port 2048-1024").unwrap();
    let err = crate::evaluate(&expr, &flowline_flow::Flow::default()).unwrap_err();
    assert!(matches!(err, FilterError::Semantic(_)));
}
