//! Pipeline error model.

use moviesync_state::StateError;
use moviesync_types::error::ErrorCategory;
use moviesync_types::phase::Stage;
use moviesync_types::record::BatchShapeError;

/// Failure of a pipeline stage or of the machinery around it.
///
/// Every stage returns `Result<StageOutput<T>, PipelineError>`, so an empty
/// change set is never mistaken for a failed query. Any error aborts the run
/// before the candidate watermark is promoted.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A source or target statement failed.
    #[error("{stage} query failed: {source}")]
    Query {
        stage: Stage,
        #[source]
        source: rusqlite::Error,
    },

    /// The batch cannot be written to the fixed target schema.
    #[error("batch does not match target schema: {0}")]
    SchemaMismatch(String),

    /// Invalid or unresolvable pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A database file could not be opened.
    #[error("cannot open {role} database '{path}': {source}")]
    Connection {
        role: &'static str,
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A transform rule could not be applied to a record.
    #[error("transform failed: {0}")]
    Transform(String),

    /// Checkpoint store failure.
    #[error("checkpoint store: {0}")]
    State(#[from] StateError),

    /// Reading or writing a stage file failed.
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A stage file is not valid JSON for the expected shape.
    #[error("malformed stage file: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Opaque host-side failure (state store creation, etc.).
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl PipelineError {
    pub(crate) fn query(stage: Stage) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Query { stage, source }
    }

    /// Broad classification for run history and operator messages.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Query { .. } => ErrorCategory::Query,
            Self::SchemaMismatch(_) => ErrorCategory::Schema,
            Self::Config(_) => ErrorCategory::Config,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Transform(_) => ErrorCategory::Transform,
            Self::State(_) => ErrorCategory::State,
            Self::Io { .. } | Self::Serialization(_) => ErrorCategory::Io,
            Self::Infrastructure(_) => ErrorCategory::Internal,
        }
    }

    /// Stage the failing statement belonged to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Query { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<BatchShapeError> for PipelineError {
    fn from(e: BatchShapeError) -> Self {
        Self::SchemaMismatch(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("no such table: film_work".into()),
        )
    }

    #[test]
    fn test_query_error_carries_stage() {
        let err = PipelineError::query(Stage::Locate)(sqlite_failure());
        assert_eq!(err.stage(), Some(Stage::Locate));
        assert_eq!(err.category(), ErrorCategory::Query);
        let msg = err.to_string();
        assert!(msg.starts_with("locate query failed"), "{msg}");
        assert!(msg.contains("no such table"), "{msg}");
    }

    #[test]
    fn test_shape_error_is_schema_mismatch() {
        let err: PipelineError = BatchShapeError::EmptyFieldSet.into();
        assert_eq!(err.category(), ErrorCategory::Schema);
        assert!(err.stage().is_none());
    }

    #[test]
    fn test_state_error_converts() {
        let err: PipelineError = StateError::LockPoisoned.into();
        assert_eq!(err.category(), ErrorCategory::State);
        assert!(err.to_string().contains("lock poisoned"));
    }

    #[test]
    fn test_infrastructure_from_anyhow() {
        let err: PipelineError = anyhow::anyhow!("state dir not writable").into();
        assert_eq!(err.category(), ErrorCategory::Internal);
        assert_eq!(err.to_string(), "state dir not writable");
    }

    #[test]
    fn test_io_and_serialization_share_category() {
        let io = PipelineError::Io {
            path: "changes.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let json: PipelineError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(io.category(), ErrorCategory::Io);
        assert_eq!(json.category(), ErrorCategory::Io);
    }
}
