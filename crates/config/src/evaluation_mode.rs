//! Evaluation mode: which address(es) of a flow key into an
//! accounting database.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

#[cfg(test)]
#[path = "evaluation_mode_test.rs"]
mod tests;

/// The rule choosing which address(es) of a flow key into a database.
///
/// The historical configuration surface grew several spellings for the
/// same mode; the superset is canonical here (`both` and
/// `destination and source` are aliases) and anything outside it is
/// rejected at segment construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum EvaluationMode {
    /// Key on the destination address (the historical default)
    #[default]
    Destination,
    /// Key on the source address
    Source,
    /// Key on both addresses; the flow counts against each
    SourceAndDestination,
    /// Key on the directed source→destination pair
    Connection,
}

impl EvaluationMode {
    /// Number of accounting keys a single flow produces in this mode.
    pub fn keys_per_flow(&self) -> usize {
        match self {
            EvaluationMode::SourceAndDestination => 2,
            _ => 1,
        }
    }
}

impl FromStr for EvaluationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "destination" => Ok(EvaluationMode::Destination),
            "source" => Ok(EvaluationMode::Source),
            "both" | "source and destination" | "destination and source" => {
                Ok(EvaluationMode::SourceAndDestination)
            }
            "connection" => Ok(EvaluationMode::Connection),
            other => Err(format!("unknown evaluation mode '{other}'")),
        }
    }
}

impl TryFrom<String> for EvaluationMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvaluationMode::Destination => "destination",
            EvaluationMode::Source => "source",
            EvaluationMode::SourceAndDestination => "source and destination",
            EvaluationMode::Connection => "connection",
        };
        f.write_str(name)
    }
}
