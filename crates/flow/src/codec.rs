//! JSON line codec for flows.
//!
//! One flow per line, zero values omitted, raw address bytes encoded as
//! base64. The same shape is written by the `json` sink, read back by
//! the `stdin` source and used for disk-buffer spool files, so the two
//! directions must stay inverse of each other.

use crate::error::FlowError;
use crate::flow::Flow;

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;

/// Encode a flow as a single JSON line (no trailing newline).
pub fn encode_line(flow: &Flow) -> Result<String, FlowError> {
    serde_json::to_string(flow).map_err(FlowError::Encode)
}

/// Decode a flow from a single JSON line.
pub fn decode_line(line: &str) -> Result<Flow, FlowError> {
    serde_json::from_str(line).map_err(FlowError::Decode)
}

pub(crate) fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

pub(crate) fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

pub(crate) fn is_false(v: &bool) -> bool {
    !*v
}

/// Serde helper: `Vec<u8>` as standard base64, the shape protojson uses
/// for bytes fields.
pub(crate) mod b64 {
    use base64::prelude::{Engine, BASE64_STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
