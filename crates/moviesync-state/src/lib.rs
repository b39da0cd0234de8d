//! Checkpoint persistence for moviesync.
//!
//! Provides the [`CheckpointStore`] trait and a [`SqliteCheckpointStore`]
//! implementation holding confirmed/candidate watermarks and run history.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod sqlite;

pub use backend::CheckpointStore;
pub use error::StateError;
pub use sqlite::SqliteCheckpointStore;

/// Common imports for store users.
pub mod prelude {
    pub use crate::backend::CheckpointStore;
    pub use crate::error::StateError;
    pub use crate::sqlite::SqliteCheckpointStore;
    pub use moviesync_types::state::{CheckpointKey, PipelineId, RunStats, RunStatus};
}
