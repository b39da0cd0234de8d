//! Error classification and check results shared across crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad classification of a pipeline failure.
///
/// Used for operator-facing messages and run history; the engine's error
/// type maps each variant onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid pipeline configuration.
    Config,
    /// A database file or host could not be opened.
    Connection,
    /// A source or target statement failed.
    Query,
    /// Batch shape does not match the target schema.
    Schema,
    /// A transform rule could not be applied.
    Transform,
    /// Checkpoint store failure.
    State,
    /// File-system or serialization failure around stage files.
    Io,
    /// Broken internal invariant.
    Internal,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Connection => "connection",
            Self::Query => "query",
            Self::Schema => "schema",
            Self::Transform => "transform",
            Self::State => "state",
            Self::Io => "io",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    Failed,
    Warning,
}

/// Result of one connectivity or configuration check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub message: String,
}

impl ValidationResult {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == ValidationStatus::Failed
    }
}
