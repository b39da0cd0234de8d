//! Per-run settings handed to every stage.

use std::str::FromStr;

use moviesync_types::field::Field;
use moviesync_types::load::LoadMode;
use moviesync_types::state::PipelineId;

use crate::config::types::PipelineConfig;
use crate::errors::PipelineError;
use crate::resolve::{ConnectionDescriptor, ConnectionResolver};
use crate::transform::Transformer;

/// Everything a stage needs, resolved once from the pipeline file.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub pipeline: PipelineId,
    pub chunk_size: usize,
    /// Requested fields, in output order.
    pub fields: Vec<Field>,
    pub source: ConnectionDescriptor,
    pub target: ConnectionDescriptor,
    pub load_mode: LoadMode,
    pub auto_promote: bool,
    pub transformer: Transformer,
}

impl SyncContext {
    /// Resolve connections, parse field names and compile transform rules.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for unknown fields, an out-of-range
    /// chunk size, invalid transform rules or unresolvable connection ids.
    pub fn from_config(
        config: &PipelineConfig,
        resolver: &dyn ConnectionResolver,
    ) -> Result<Self, PipelineError> {
        config.check_chunk_size().map_err(PipelineError::Config)?;

        let fields = config
            .fields
            .iter()
            .map(|name| Field::from_str(name).map_err(|e| PipelineError::Config(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        if fields.is_empty() {
            return Err(PipelineError::Config(
                "at least one field must be requested".to_string(),
            ));
        }

        let transformer = Transformer::compile(&config.transforms)
            .map_err(|e| PipelineError::Config(format!("transforms: {e}")))?;

        Ok(Self {
            pipeline: PipelineId::new(config.pipeline.clone()),
            chunk_size: config.chunk_size,
            fields,
            source: resolver.resolve(&config.source_connection_id)?,
            target: resolver.resolve(&config.target_connection_id)?,
            load_mode: config.load_mode,
            auto_promote: config.auto_promote,
            transformer,
        })
    }
}
