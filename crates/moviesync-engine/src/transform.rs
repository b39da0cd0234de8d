//! Record transformation between fetch and load.
//!
//! With no rules configured the transformer is the identity. Rules are
//! compiled once from the pipeline file and applied to every record in
//! declaration order; the input batch is never mutated.

use moviesync_types::phase::StageOutput;
use moviesync_types::record::{AggregateRecord, Batch};
use moviesync_types::watermark::Watermark;
use serde_json::Value;

use crate::config::types::{FieldSelector, TransformRuleSpec};
use crate::errors::PipelineError;

/// One executable rule.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledRule {
    Rename { from: String, to: String },
    Default { field: String, value: Value },
    CanonicalTimestamp { field: String },
    DropIfNull { field: String },
}

/// Compiled transform rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformer {
    rules: Vec<CompiledRule>,
}

fn ensure_non_empty_field(field: &str) -> Result<(), String> {
    if field.trim().is_empty() {
        Err("field name must not be empty".to_string())
    } else {
        Ok(())
    }
}

fn selected_fields<'a>(selector: &'a FieldSelector, rule: &str) -> Result<&'a [String], String> {
    let fields = selector.fields();
    if fields.is_empty() {
        return Err(format!("{rule} must name at least one field"));
    }
    for field in fields {
        ensure_non_empty_field(field)?;
    }
    Ok(fields)
}

impl Transformer {
    /// The identity transformer.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Compile rule specs from the pipeline file.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid rule.
    pub fn compile(specs: &[TransformRuleSpec]) -> Result<Self, String> {
        let mut rules = Vec::new();
        for spec in specs {
            match spec {
                TransformRuleSpec::Rename { rename } => {
                    if rename.is_empty() {
                        return Err("rename must map at least one field".to_string());
                    }
                    for (from, to) in rename {
                        ensure_non_empty_field(from)?;
                        ensure_non_empty_field(to)?;
                        if from == to {
                            return Err(format!("rename maps '{from}' to itself"));
                        }
                        rules.push(CompiledRule::Rename {
                            from: from.clone(),
                            to: to.clone(),
                        });
                    }
                }
                TransformRuleSpec::Default { default } => {
                    if default.is_empty() {
                        return Err("default must set at least one field".to_string());
                    }
                    for (field, value) in default {
                        ensure_non_empty_field(field)?;
                        if value.is_array() || value.is_object() {
                            return Err(format!("default for '{field}' must be a scalar value"));
                        }
                        rules.push(CompiledRule::Default {
                            field: field.clone(),
                            value: value.clone(),
                        });
                    }
                }
                TransformRuleSpec::CanonicalTimestamp {
                    canonical_timestamp,
                } => {
                    for field in selected_fields(canonical_timestamp, "canonical_timestamp")? {
                        rules.push(CompiledRule::CanonicalTimestamp {
                            field: field.clone(),
                        });
                    }
                }
                TransformRuleSpec::DropIfNull { drop_if_null } => {
                    for field in selected_fields(drop_if_null, "drop_if_null")? {
                        rules.push(CompiledRule::DropIfNull {
                            field: field.clone(),
                        });
                    }
                }
            }
        }
        Ok(Self { rules })
    }

    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.rules.is_empty()
    }

    /// Column names a batch with `input` columns has after transformation.
    #[must_use]
    pub fn output_columns(&self, input: &[&str]) -> Vec<String> {
        let mut columns: Vec<String> = input.iter().map(|c| (*c).to_string()).collect();
        for rule in &self.rules {
            match rule {
                CompiledRule::Rename { from, to } => {
                    if let Some(col) = columns.iter_mut().find(|c| c.as_str() == from.as_str()) {
                        col.clone_from(to);
                    }
                }
                CompiledRule::Default { field, .. } => {
                    if !columns.contains(field) {
                        columns.push(field.clone());
                    }
                }
                CompiledRule::CanonicalTimestamp { .. } | CompiledRule::DropIfNull { .. } => {}
            }
        }
        columns
    }

    /// Transform a batch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transform`] when a rename would overwrite an
    /// existing field.
    pub fn apply(&self, batch: &Batch) -> Result<StageOutput<Batch>, PipelineError> {
        if batch.is_empty() {
            tracing::info!("No records to transform");
            return Ok(StageOutput::Empty);
        }
        if self.is_identity() {
            return Ok(StageOutput::Ready(batch.clone()));
        }

        let mut out = Vec::with_capacity(batch.len());
        for (index, record) in batch.records().iter().enumerate() {
            if let Some(transformed) = self.apply_record(record.clone(), index)? {
                out.push(transformed);
            }
        }

        let dropped = batch.len() - out.len();
        tracing::info!(
            records_in = batch.len(),
            records_out = out.len(),
            dropped,
            rules = self.rules.len(),
            "Transformed batch"
        );

        if out.is_empty() {
            return Ok(StageOutput::Empty);
        }
        Ok(StageOutput::Ready(Batch::new(out)))
    }

    fn apply_record(
        &self,
        mut record: AggregateRecord,
        index: usize,
    ) -> Result<Option<AggregateRecord>, PipelineError> {
        for rule in &self.rules {
            match rule {
                CompiledRule::Rename { from, to } => {
                    if record.contains(from) && record.contains(to) {
                        return Err(PipelineError::Transform(format!(
                            "record {index}: renaming '{from}' to '{to}' would overwrite an existing field"
                        )));
                    }
                    record.rename(from, to);
                }
                CompiledRule::Default { field, value } => {
                    if record.get(field).map_or(true, Value::is_null) {
                        record.insert(field.clone(), value.clone());
                    }
                }
                CompiledRule::CanonicalTimestamp { field } => {
                    if let Some(canonical) = record.get(field).and_then(canonical_timestamp) {
                        record.insert(field.clone(), Value::String(canonical));
                    }
                }
                CompiledRule::DropIfNull { field } => {
                    if record.get(field).map_or(true, Value::is_null) {
                        tracing::debug!(
                            record = index,
                            field = field.as_str(),
                            "Dropping record with null field"
                        );
                        return Ok(None);
                    }
                }
            }
        }
        Ok(Some(record))
    }
}

/// Canonical watermark rendering of a timestamp-like value, if it is one.
fn canonical_timestamp(value: &Value) -> Option<String> {
    let watermark = match value {
        Value::String(text) => Watermark::try_parse(text).ok()?,
        Value::Number(n) => Watermark::from_epoch_secs(n.as_f64()?)?,
        _ => return None,
    };
    Some(watermark.to_string())
}
