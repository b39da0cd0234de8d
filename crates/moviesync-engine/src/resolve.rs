//! Connection resolution and checkpoint store creation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use moviesync_state::{CheckpointStore, SqliteCheckpointStore};

use crate::config::types::{ConnectionConfig, PipelineConfig, StateBackendKind};
use crate::errors::PipelineError;

/// Location of one database, as handed out by a [`ConnectionResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub schema: String,
}

impl ConnectionDescriptor {
    #[must_use]
    pub fn new(host: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            schema: schema.into(),
        }
    }

    /// Database file: `schema` under the `host` directory. An absolute
    /// `schema` replaces `host`.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.host).join(&self.schema)
    }
}

impl From<&ConnectionConfig> for ConnectionDescriptor {
    fn from(conn: &ConnectionConfig) -> Self {
        Self::new(conn.host.clone(), conn.schema.clone())
    }
}

/// Maps logical connection ids to database locations.
pub trait ConnectionResolver {
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when `id` is unknown.
    fn resolve(&self, id: &str) -> Result<ConnectionDescriptor, PipelineError>;
}

/// Resolver backed by the `connections` section of the pipeline file.
#[derive(Debug, Clone, Default)]
pub struct RegistryResolver {
    connections: BTreeMap<String, ConnectionDescriptor>,
}

impl RegistryResolver {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            connections: config
                .connections
                .iter()
                .map(|(id, conn)| (id.clone(), ConnectionDescriptor::from(conn)))
                .collect(),
        }
    }

    /// Register or replace a connection.
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, descriptor: ConnectionDescriptor) -> Self {
        self.connections.insert(id.into(), descriptor);
        self
    }
}

impl ConnectionResolver for RegistryResolver {
    fn resolve(&self, id: &str) -> Result<ConnectionDescriptor, PipelineError> {
        self.connections
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::Config(format!("unknown connection id '{id}'")))
    }
}

/// Default checkpoint database location: `~/.moviesync/state.db`.
fn default_state_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".moviesync").join("state.db")
}

/// Open the checkpoint store configured for `config`.
///
/// # Errors
///
/// Returns an error if the state database cannot be opened or created.
pub fn create_state_store(config: &PipelineConfig) -> Result<Arc<dyn CheckpointStore>> {
    match config.state.backend {
        StateBackendKind::Sqlite => {
            let store = if let Some(path) = &config.state.connection {
                SqliteCheckpointStore::open(Path::new(path)).context("Failed to open state DB")?
            } else {
                SqliteCheckpointStore::open(&default_state_path())
                    .context("Failed to open default state DB")?
            };
            Ok(Arc::new(store) as Arc<dyn CheckpointStore>)
        }
    }
}
