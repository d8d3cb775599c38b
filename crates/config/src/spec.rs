//! Segment spec representation and config value expansion.

use std::collections::BTreeMap;
use std::env;

use serde::Deserialize;

use crate::toptalkers::ThresholdMetricSpec;

#[cfg(test)]
#[path = "spec_test.rs"]
mod tests;

/// A config representation of one segment entry.
///
/// The `if`/`then`/`else` lists are only meaningful for the `branch`
/// segment; the builder ignores them everywhere else.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentSpec {
    /// Registry key of the segment to instantiate
    pub segment: String,

    /// Segment options
    #[serde(default)]
    pub config: SegmentConfig,

    /// Parallel instances of this segment (1 = no fan-out)
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Condition sub-pipeline (branch only)
    #[serde(default, rename = "if")]
    pub if_branch: Vec<SegmentSpec>,

    /// Sub-pipeline for flows the condition passed (branch only)
    #[serde(default, rename = "then")]
    pub then_branch: Vec<SegmentSpec>,

    /// Sub-pipeline for flows the condition dropped (branch only)
    #[serde(default, rename = "else")]
    pub else_branch: Vec<SegmentSpec>,
}

fn default_jobs() -> usize {
    1
}

/// Options of one segment: a scalar map plus typed blocks.
///
/// Scalar values (strings, numbers, booleans) are normalized to strings;
/// per-segment documentation defines how they are parsed further.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentConfig {
    /// Typed block for the traffic-specific top-talkers segment
    #[serde(default)]
    pub traffic_specific_toptalkers: Vec<ThresholdMetricSpec>,

    #[serde(flatten)]
    options: BTreeMap<String, ScalarValue>,
}

impl SegmentConfig {
    /// Build a config from plain string options (used by tests and the
    /// segment constructors' own tests).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            traffic_specific_toptalkers: Vec::new(),
            options: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), ScalarValue::String(v.into())))
                .collect(),
        }
    }

    /// Raw option value, stringified, without expansion.
    pub fn get(&self, key: &str) -> Option<String> {
        self.options.get(key).map(ScalarValue::to_config_string)
    }

    /// Option value with `$N`/environment expansion applied.
    ///
    /// `args` are the free command line arguments backing `$0`, `$1`, …
    pub fn get_expanded(&self, key: &str, args: &[String]) -> Option<String> {
        self.get(key).map(|v| expand_value(&v, args))
    }

    /// All option keys present in the config.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    /// The full option map with expansion applied to every value.
    pub fn expanded(&self, args: &[String]) -> BTreeMap<String, String> {
        self.options
            .iter()
            .map(|(k, v)| (k.clone(), expand_value(&v.to_config_string(), args)))
            .collect()
    }
}

/// A YAML scalar in an option position.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null(()),
}

impl ScalarValue {
    fn to_config_string(&self) -> String {
        match self {
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::String(s) => s.clone(),
            ScalarValue::Null(()) => String::new(),
        }
    }
}

/// Expand `$`-tokens in a config value.
///
/// Numeric tokens (`$0`, `$1`, …) map to the free command line
/// arguments; any other token maps to the empty string in this first
/// pass. If that pass empties a non-empty input, the original value is
/// expanded against the process environment instead.
pub fn expand_value(value: &str, args: &[String]) -> String {
    let argv_expanded = expand(value, |name| {
        name.parse::<usize>()
            .ok()
            .and_then(|n| args.get(n).cloned())
            .unwrap_or_default()
    });
    if argv_expanded.is_empty() && !value.is_empty() {
        return expand(value, |name| env::var(name).unwrap_or_default());
    }
    argv_expanded
}

/// Minimal `$NAME` / `${NAME}` substitution.
fn expand(input: &str, mapper: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&(_, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed {
                    out.push_str(&mapper(&name));
                } else {
                    // unterminated brace, keep the literal text
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some(&(_, c)) if c.is_ascii_alphanumeric() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&mapper(&name));
            }
            _ => out.push('$'),
        }
    }
    out
}
