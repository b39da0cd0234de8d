//! Semantic validation for parsed pipeline configuration values.

use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{bail, Result};
use moviesync_types::field::Field;

use crate::config::types::PipelineConfig;
use crate::schema::TARGET_COLUMNS;
use crate::transform::Transformer;

/// Parse the configured field names, reporting every unknown or repeated one.
fn validate_fields(names: &[String], errors: &mut Vec<String>) -> Vec<Field> {
    if names.is_empty() {
        errors.push("At least one field must be requested".to_string());
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(names.len());
    for name in names {
        match Field::from_str(name) {
            Ok(field) => {
                if seen.insert(field) {
                    fields.push(field);
                } else {
                    errors.push(format!("Field '{name}' is requested more than once"));
                }
            }
            Err(e) => errors.push(format!(
                "{e}; expected one of: {}",
                Field::ALL.map(Field::as_str).join(", ")
            )),
        }
    }

    if !fields.is_empty() && !seen.contains(&Field::FilmId) {
        errors.push("Field 'film_id' is required: it is the target primary key".to_string());
    }
    fields
}

fn validate_connections(config: &PipelineConfig, errors: &mut Vec<String>) {
    for (role, id) in [
        ("source_connection_id", &config.source_connection_id),
        ("target_connection_id", &config.target_connection_id),
    ] {
        if id.trim().is_empty() {
            errors.push(format!("{role} must not be empty"));
            continue;
        }
        match config.connections.get(id) {
            None => errors.push(format!("{role} '{id}' is not defined under connections")),
            Some(conn) if conn.schema.trim().is_empty() => {
                errors.push(format!("Connection '{id}' has an empty schema"));
            }
            Some(_) => {}
        }
    }

    if !config.source_connection_id.is_empty()
        && config.source_connection_id == config.target_connection_id
    {
        errors.push(
            "source_connection_id and target_connection_id must differ: the load drops the target table"
                .to_string(),
        );
    }
}

/// Validate a parsed pipeline configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the pipeline config.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported pipeline version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.pipeline.trim().is_empty() {
        errors.push("Pipeline name must not be empty".to_string());
    }

    if let Err(msg) = config.check_chunk_size() {
        errors.push(msg);
    }

    let fields = validate_fields(&config.fields, &mut errors);
    validate_connections(config, &mut errors);

    match Transformer::compile(&config.transforms) {
        Ok(transformer) => {
            let columns: Vec<&str> = fields.iter().map(|f| f.column()).collect();
            for column in transformer.output_columns(&columns) {
                if !TARGET_COLUMNS.contains(&column.as_str()) {
                    errors.push(format!(
                        "Transforms produce column '{column}', which is not in the target schema"
                    ));
                }
            }
        }
        Err(e) => errors.push(format!("transforms: {e}")),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Pipeline validation failed:\n  - {}", errors.join("\n  - "));
    }
}
