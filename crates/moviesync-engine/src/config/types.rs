//! Pipeline configuration types.

use std::collections::BTreeMap;

use moviesync_types::load::LoadMode;
use serde::{Deserialize, Serialize};

/// Default number of changed ids picked up per run.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Lower bound accepted for `chunk_size`. The boundary row is re-read on
/// every run, so a single-row chunk could never move the watermark.
pub const MIN_CHUNK_SIZE: usize = 2;

/// Upper bound accepted for `chunk_size`.
pub const MAX_CHUNK_SIZE: usize = 10_000;

/// Top-level pipeline configuration parsed from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub version: String,
    pub pipeline: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Field names to fetch, in output order.
    pub fields: Vec<String>,
    pub source_connection_id: String,
    pub target_connection_id: String,
    #[serde(default)]
    pub load_mode: LoadMode,
    /// Promote the candidate watermark right after a successful load.
    #[serde(default = "default_true")]
    pub auto_promote: bool,
    #[serde(default)]
    pub transforms: Vec<TransformRuleSpec>,
    /// Connection registry keyed by logical connection id.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
    #[serde(default)]
    pub state: StateConfig,
}

impl PipelineConfig {
    /// Check `chunk_size` against [`MIN_CHUNK_SIZE`] and [`MAX_CHUNK_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the value is out of range.
    pub fn check_chunk_size(&self) -> Result<(), String> {
        if (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Ok(());
        }
        Err(format!(
            "chunk_size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}, got {} \
             (the last row of each run is read again by the next one, so fewer \
             than {MIN_CHUNK_SIZE} rows per run never advances the watermark)",
            self.chunk_size
        ))
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_true() -> bool {
    true
}

/// Registry entry for one logical connection.
///
/// The database file lives at `host/schema`; an absolute `schema` is used
/// as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub host: String,
    pub schema: String,
}

/// Checkpoint store backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackendKind {
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackendKind,
    /// Database path; defaults to `~/.moviesync/state.db`.
    pub connection: Option<String>,
}

/// One transform rule as written in YAML.
///
/// ```yaml
/// transforms:
///   - rename: { genre: genres }
///   - default: { rating: 0.0 }
///   - canonical_timestamp: [created_at, updated_at]
///   - drop_if_null: title
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformRuleSpec {
    Rename {
        rename: BTreeMap<String, String>,
    },
    Default {
        default: BTreeMap<String, serde_json::Value>,
    },
    CanonicalTimestamp {
        canonical_timestamp: FieldSelector,
    },
    DropIfNull {
        drop_if_null: FieldSelector,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSelector {
    One(String),
    Many(Vec<String>),
}

impl FieldSelector {
    #[must_use]
    pub fn fields(&self) -> &[String] {
        match self {
            Self::One(field) => std::slice::from_ref(field),
            Self::Many(fields) => fields,
        }
    }
}
