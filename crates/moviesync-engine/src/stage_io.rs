//! JSON files exchanged between separately scheduled stages.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::PipelineError;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Read a stage file (`ChangeSet` or `Batch`).
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the file cannot be read, or
/// [`PipelineError::Serialization`] if it does not hold the expected shape.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a stage file as pretty-printed JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the file cannot be written.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    std::fs::write(path, content).map_err(io_error(path))?;
    tracing::debug!(path = %path.display(), "Wrote stage file");
    Ok(())
}
