//! Flowline - Configuration
//!
//! YAML-based pipeline configuration. A config file is a sequence of
//! segment entries:
//!
//! ```yaml
//! - segment: stdin
//!   config:
//!     filename: flows.json
//!     eofcloses: true
//! - segment: branch
//!   if:
//!   - segment: flowfilter
//!     config:
//!       filter: proto tcp
//!   then:
//!   - segment: dropfields
//!     config: { policy: drop, fields: InIf }
//!   else:
//!   - segment: dropfields
//!     config: { policy: drop, fields: OutIf }
//! - segment: json
//! ```
//!
//! Config values are scalars normalized to strings; each value supports
//! `$N` positional-argument expansion (the N-th free command line
//! argument) with environment-variable expansion as the fallback.
//! Structured add-ons that do not fit the string map (the
//! `traffic_specific_toptalkers` block) are typed fields next to it.

mod error;
mod evaluation_mode;
mod spec;
mod toptalkers;

pub use error::{ConfigError, Result};
pub use evaluation_mode::EvaluationMode;
pub use spec::{expand_value, SegmentConfig, SegmentSpec};
pub use toptalkers::ThresholdMetricSpec;

/// Parse an ordered list of segment specs from YAML bytes.
pub fn specs_from_yaml(input: &str) -> Result<Vec<SegmentSpec>> {
    serde_yaml::from_str(input).map_err(ConfigError::Yaml)
}
