//! Flowline - Flow record
//!
//! The uniform message type passed between pipeline segments, plus the
//! JSON line codec used by the stdin source, the json sink and the disk
//! buffer.
//!
//! # Overview
//!
//! A [`Flow`] summarizes a set of packets sharing an identifying tuple:
//! addresses, ports, interfaces, volumetrics, timestamps, decoded L3/L4
//! fields and a tail of enrichment fields filled in by modify segments.
//! Segments mutate flows in place; a flow is owned exclusively by one
//! segment at a time.
//!
//! # Key invariants
//!
//! - Addresses are raw 4- or 16-byte values; textual forms (`source_ip`
//!   and friends) may coexist and are only filled by `addrstrings`.
//! - The second/millisecond/nanosecond representations of each timestamp
//!   are kept mutually consistent by [`Flow::sync_missing_timestamps`],
//!   which never overwrites a non-zero slot.
//! - `bytes`/`packets` are raw observed counts until a normalize segment
//!   applies the sampling rate and marks the flow as normalized.
//!
//! # Field table
//!
//! Field-name-driven segments (`dropfields`, `csv`) go through a static
//! name table instead of reflection: [`Flow::FIELD_NAMES`],
//! [`Flow::clear_field`], [`Flow::copy_field`] and [`Flow::format_field`].
//! Unknown names are rejected at segment construction.

mod codec;
mod error;
mod fields;
mod flow;

pub use codec::{decode_line, encode_line};
pub use error::FlowError;
pub use fields::FieldFmt;
pub use flow::{
    AddrAnon, Flow, FlowType, Normalized, RemoteAddrSide, ValidationStatus, format_mac,
};

/// Result type for flow codec operations
pub type Result<T> = std::result::Result<T, FlowError>;
