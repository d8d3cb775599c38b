//! Sink segments. Sinks are pass-through by contract: every flow
//! continues downstream so sinks can be chained.

pub mod csv;
pub mod json;
