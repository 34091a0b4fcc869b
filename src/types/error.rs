#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::PredicateCondition;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Errors raised while building statistics, estimating predicates, or
/// sharing the cardinality cache.
///
/// Every failure is deterministic for a given input; nothing in the crate
/// retries.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Cache payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Bin export failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Construction-time invariant violation (alphabet, prefix length, options).
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A string value used characters outside the declared alphabet.
    #[error("value '{value}' contains characters outside the supported range '{alphabet}'")]
    UnsupportedCharacters {
        /// Offending value.
        value: String,
        /// Alphabet the domain accepts.
        alphabet: String,
    },
    /// Predicate kind cannot be answered for this column type.
    #[error("predicate {condition} is not supported: {reason}")]
    UnsupportedPredicate {
        /// Predicate that was requested.
        condition: PredicateCondition,
        /// Short reason string.
        reason: &'static str,
    },
    /// Caller supplied malformed arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A histogram was requested for a column without any values.
    #[error("cannot build a histogram from an empty distribution")]
    EmptyDistribution,
    /// Literal type does not match the column type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Column type.
        expected: &'static str,
        /// Literal type.
        found: &'static str,
    },
    /// Named statistics object is unknown.
    #[error("{0} not found")]
    NotFound(String),
    /// A value/count input row could not be parsed.
    #[error("invalid input on line {line}: {message}")]
    InvalidInput {
        /// One-based line number in the input.
        line: u64,
        /// What was wrong with the row.
        message: String,
    },
    /// The cache file could not be opened.
    #[error("cardinality cache unavailable at {path}: {source}")]
    CacheUnavailable {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying open error.
        source: io::Error,
    },
}

impl StatsError {
    /// Stable identifier for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            StatsError::Io(_) => "Io",
            StatsError::Json(_) => "Json",
            StatsError::Csv(_) => "Csv",
            StatsError::Config(_) => "Config",
            StatsError::UnsupportedCharacters { .. } => "UnsupportedCharacters",
            StatsError::UnsupportedPredicate { .. } => "UnsupportedPredicate",
            StatsError::InvalidArgument(_) => "InvalidArgument",
            StatsError::EmptyDistribution => "EmptyDistribution",
            StatsError::TypeMismatch { .. } => "TypeMismatch",
            StatsError::NotFound(_) => "NotFound",
            StatsError::InvalidInput { .. } => "InvalidInput",
            StatsError::CacheUnavailable { .. } => "CacheUnavailable",
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        StatsError::Config(message.into())
    }

    pub(crate) fn unsupported(condition: PredicateCondition, reason: &'static str) -> Self {
        StatsError::UnsupportedPredicate { condition, reason }
    }
}
