//! Opening source and target databases.
//!
//! Connections are opened per stage invocation and dropped when the stage
//! returns, on error paths included.

use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::errors::PipelineError;
use crate::resolve::ConnectionDescriptor;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the source database read-only. The file must already exist.
///
/// # Errors
///
/// Returns [`PipelineError::Connection`] if the file cannot be opened.
pub fn open_source(descriptor: &ConnectionDescriptor) -> Result<Connection, PipelineError> {
    let path = descriptor.database_path();
    let conn = Connection::open_with_flags(
        &path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .and_then(|conn| conn.busy_timeout(BUSY_TIMEOUT).map(|()| conn))
    .map_err(|source| PipelineError::Connection {
        role: "source",
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "Opened source database");
    Ok(conn)
}

/// Open the target database read-write, creating the file and its parent
/// directory when missing.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the directory cannot be created, or
/// [`PipelineError::Connection`] if the file cannot be opened.
pub fn open_target(descriptor: &ConnectionDescriptor) -> Result<Connection, PipelineError> {
    let path = descriptor.database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let conn = Connection::open(&path)
        .and_then(|conn| conn.busy_timeout(BUSY_TIMEOUT).map(|()| conn))
        .map_err(|source| PipelineError::Connection {
            role: "target",
            path: path.display().to_string(),
            source,
        })?;
    tracing::debug!(path = %path.display(), "Opened target database");
    Ok(conn)
}
