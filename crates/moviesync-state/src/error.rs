//! Checkpoint store error types.

/// Errors produced by [`CheckpointStore`](crate::CheckpointStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `SQLite` failure tagged with the store operation that hit it.
    #[error("{operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be mapped back to its model type.
    #[error("corrupt checkpoint data: {0}")]
    Corrupt(String),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("checkpoint store lock poisoned")]
    LockPoisoned,
}

impl StateError {
    /// Wrap a `SQLite` error with the name of the failing operation.
    #[must_use]
    pub fn operation(operation: &'static str, source: rusqlite::Error) -> Self {
        Self::Operation { operation, source }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;
