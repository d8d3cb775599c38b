//! Option parsing helpers shared by segment factories.
//!
//! The failure policy mirrors the configuration contract: a missing
//! optional stays silent, an unparseable optional warns and falls back
//! to the documented default, a missing required option is a
//! construction error.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{PipelineError, Result};

#[cfg(test)]
#[path = "options_test.rs"]
mod tests;

/// Fetch an optional string, `default` when absent or empty.
pub fn optional(opts: &BTreeMap<String, String>, key: &str, default: &str) -> String {
    match opts.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.to_string(),
    }
}

/// Fetch and parse an optional value, warning and falling back to
/// `default` when the value does not parse.
pub fn optional_parsed<T>(opts: &BTreeMap<String, String>, key: &str, default: T, segment: &str) -> T
where
    T: FromStr + Display,
{
    match opts.get(key) {
        Some(value) if !value.is_empty() => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(
                    segment,
                    option = key,
                    value = %value,
                    default = %default,
                    "could not parse option, using default"
                );
                default
            }
        },
        _ => default,
    }
}

/// Fetch a required string option.
pub fn required(opts: &BTreeMap<String, String>, key: &str, segment: &str) -> Result<String> {
    match opts.get(key) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(PipelineError::construction(
            segment,
            format!("missing required option '{key}'"),
        )),
    }
}
