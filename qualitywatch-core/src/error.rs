//! Error types for the engine.

use std::fmt;
use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// An invalid metric or target definition.
///
/// Raised eagerly while building definitions, so a bad configuration fails
/// the whole run instead of silently degrading individual metrics.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A dynamic technical-debt target must end after it starts.
    #[error("technical debt target ends at {end} which is not after its start {start}")]
    InvalidDebtInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The target is worse than the low target for the metric's direction.
    #[error("metric {metric}: target {target} is worse than low target {low_target}")]
    InconsistentTargets {
        metric: String,
        target: String,
        low_target: String,
    },

    /// A metric needs thresholds but none were given.
    #[error("metric {0}: no targets configured")]
    MissingTargets(String),

    /// An ordinal label used as a threshold is not on the scale.
    #[error("metric {metric}: label {label:?} is not on the ordinal scale")]
    UnknownLabel { metric: String, label: String },

    /// A metric refers to a source that is not registered.
    #[error("metric {metric}: unknown source {source_name}")]
    UnknownSource { metric: String, source_name: String },

    /// Two metrics share an id.
    #[error("duplicate metric id {0}")]
    DuplicateMetric(String),

    /// The id cannot be used because the history format reserves it.
    #[error("metric id {0:?} is reserved")]
    ReservedId(String),
}

/// Where in the history file a line sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePosition {
    /// 1-based line number from the start of the file.
    FromStart(usize),
    /// 1-based line number counted back from the end of the file.
    FromEnd(usize),
}

impl fmt::Display for LinePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinePosition::FromStart(n) => write!(f, "line {n}"),
            LinePosition::FromEnd(n) => write!(f, "line {n} from the end"),
        }
    }
}

/// Errors reading or writing the history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Filesystem error.
    #[error("history I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line could not be parsed as a history record.
    #[error("corrupt history record at {position}: {source}")]
    Corrupt {
        position: LinePosition,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be serialized.
    #[error("failed to encode history record: {0}")]
    Encode(#[source] serde_json::Error),
}
