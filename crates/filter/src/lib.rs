//! Flowline - Flow filter language
//!
//! A small predicate language over flow records, used by the
//! `flowfilter` segment (and through it by `branch` conditions) and by
//! the traffic-specific top-talkers segment for selective accounting.
//!
//! # Language
//!
//! An expression is a boolean tree of `and`/`or`/`not` over statements.
//! A statement is a directional match, a regular match or a
//! parenthesized sub-expression:
//!
//! ```text
//! src port 53 and not proto tcp
//! (address 10.0.0.0/8 or address 192.168.0.0/16) and bytes >1000
//! dst iface speed 10000-40000 or passes-through 64500 64501
//! ```
//!
//! Directional matches (`address`, `iface`, `port`, `asn`, `netsize`,
//! `cid`, `vrf`) may be qualified with `src` or `dst`; unqualified they
//! match either side. Numeric positions accept an equality (`53`), a
//! unary comparison (`<1000`, `>1000`) or an inclusive range
//! (`1024-2048`); a range with the lower bound above the upper bound is
//! a semantic error reported at evaluation time.
//!
//! The empty expression matches every flow.
//!
//! # Usage
//!
//! ```ignore
//! let expr = flowline_filter::parse("src port 53 and not proto tcp")?;
//! let matched = flowline_filter::evaluate(&expr, &flow)?;
//! ```

mod ast;
mod error;
mod eval;
mod parser;

pub use ast::{
    Conjunction, Direction, DirectionalMatcher, Expression, FlowDir, IcmpMatcher,
    InterfaceMatcher, NumericRange, RegularMatcher, Statement, StatementKind, StatusMatcher,
    TcpFlagsMatcher,
};
pub use error::FilterError;
pub use eval::evaluate;
pub use parser::parse;

/// Result type for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;
