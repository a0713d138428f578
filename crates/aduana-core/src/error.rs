//! Error types for the Aduana report layer.

use crate::report::Candidate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the report cache and query layer.
///
/// Local, recoverable conditions (stale pointer, ambiguous candidates) are
/// normally encoded in result structs such as `PickOutcome`; the variants
/// here exist for operations where the condition terminates the call, e.g.
/// filtering a display-only report.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AduanaError {
    /// No report candidate exists at all for the session/domain.
    #[error("no active report for this session")]
    NoActiveReport,

    /// A candidate was found but its freshness window has elapsed.
    #[error("report of kind '{kind}' expired {age_min} minutes past its TTL")]
    TtlExpired { kind: String, age_min: i64 },

    /// More than one fresh candidate; the caller must disambiguate.
    #[error("ambiguous: {} fresh reports are live", candidates.len())]
    Ambiguous { candidates: Vec<Candidate> },

    /// The report exists but carries no structured payload (display-only).
    #[error("report '{id}' has no structured rows to operate on")]
    RowsMissing { id: String },

    /// An LLM planner tier returned unparseable output.
    #[error("planner output could not be parsed: {0}")]
    PlannerParse(String),

    /// A filter/classification parameter is out of its valid range.
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Data access error (context store / storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AduanaError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a PlannerParse error
    pub fn planner_parse(message: impl Into<String>) -> Self {
        Self::PlannerParse(message.into())
    }

    /// Creates a RowsMissing error
    pub fn rows_missing(id: impl Into<String>) -> Self {
        Self::RowsMissing { id: id.into() }
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a RowsMissing error
    pub fn is_rows_missing(&self) -> bool {
        matches!(self, Self::RowsMissing { .. })
    }

    /// Check if this is a planner parse error
    pub fn is_planner_parse(&self) -> bool {
        matches!(self, Self::PlannerParse(_))
    }

    /// Check if this error is recoverable by regenerating the report.
    ///
    /// Returns true for `NoActiveReport` and `TtlExpired`, the two
    /// conditions a caller resolves by asking the producer to run again.
    pub fn needs_regeneration(&self) -> bool {
        matches!(self, Self::NoActiveReport | Self::TtlExpired { .. })
    }
}

impl From<std::io::Error> for AduanaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for AduanaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AduanaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (transitional, for repository boundaries)
impl From<anyhow::Error> for AduanaError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, AduanaError>`.
pub type Result<T> = std::result::Result<T, AduanaError>;
