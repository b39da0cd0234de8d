//! Aggregate fetching: one flattened record per changed film.

use moviesync_types::change_set::{ChangeSet, EntityId};
use moviesync_types::field::{Field, PersonRole};
use moviesync_types::phase::{Stage, StageOutput};
use moviesync_types::record::{AggregateRecord, Batch};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;

use crate::connection::open_source;
use crate::context::SyncContext;
use crate::errors::PipelineError;

/// Ids bound per statement; larger id lists are split.
const MAX_IDS_PER_QUERY: usize = 500;

/// Flattened `"<person id> : <full name>"` list for one role.
///
/// The inner `DISTINCT` collapses duplicate bridge rows; `coalesce` turns a
/// film without such people into `""`.
fn person_aggregate(role: PersonRole) -> String {
    format!(
        "coalesce((SELECT group_concat(entry, ', ' ORDER BY entry) FROM (\
             SELECT DISTINCT p.id || ' : ' || p.full_name AS entry \
             FROM person_film_work pfw JOIN person p ON p.id = pfw.person_id \
             WHERE pfw.film_work_id = fw.id AND pfw.role = '{role}')), '')",
        role = role.as_str()
    )
}

const GENRE_AGGREGATE: &str = "coalesce((SELECT group_concat(entry, ', ' ORDER BY entry) FROM (\
     SELECT DISTINCT g.name AS entry \
     FROM genre_film_work gfw JOIN genre g ON g.id = gfw.genre_id \
     WHERE gfw.film_work_id = fw.id)), '')";

/// Source expression for a field. Person fields aggregate by their role;
/// scalar fields read the `film_work` column of the same name.
fn expression(field: Field) -> String {
    if let Some(role) = field.person_role() {
        return person_aggregate(role);
    }
    match field {
        Field::Genre => GENRE_AGGREGATE.to_string(),
        scalar => format!("fw.{}", scalar.column()),
    }
}

/// `SELECT` over `film_work fw` for `id_count` ids.
fn fetch_sql(fields: &[Field], id_count: usize) -> String {
    let projection = fields
        .iter()
        .map(|f| format!("{} AS \"{}\"", expression(*f), f.column()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=id_count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {projection} FROM film_work fw WHERE fw.id IN ({placeholders}) ORDER BY fw.id"
    )
}

/// Fetch aggregates for a change set using the context's source connection.
///
/// # Errors
///
/// Returns [`PipelineError::Connection`] if the source cannot be opened, or
/// [`PipelineError::Query`] if the query fails.
pub fn fetch(
    ctx: &SyncContext,
    change_set: &ChangeSet,
) -> Result<StageOutput<Batch>, PipelineError> {
    if change_set.is_empty() {
        tracing::info!("No records need to be updated");
        return Ok(StageOutput::Empty);
    }
    let conn = open_source(&ctx.source)?;
    fetch_in(&conn, change_set.ids(), &ctx.fields)
}

/// One record per id that exists in `film_work`, ordered by id, with keys
/// in the order of `fields`.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] when `fields` is empty, or
/// [`PipelineError::Query`] if the query fails.
pub fn fetch_in(
    conn: &Connection,
    ids: &[EntityId],
    fields: &[Field],
) -> Result<StageOutput<Batch>, PipelineError> {
    if ids.is_empty() {
        tracing::info!("No records need to be updated");
        return Ok(StageOutput::Empty);
    }
    if fields.is_empty() {
        return Err(PipelineError::Config(
            "at least one field must be requested".to_string(),
        ));
    }

    let mut sorted: Vec<&EntityId> = ids.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut records = Vec::with_capacity(sorted.len());
    for chunk in sorted.chunks(MAX_IDS_PER_QUERY) {
        let sql = fetch_sql(fields, chunk.len());
        tracing::debug!(ids = chunk.len(), sql = sql.as_str(), "Fetching aggregates");
        let mut stmt = conn.prepare(&sql).map_err(PipelineError::query(Stage::Fetch))?;
        let mut rows = stmt
            .query(params_from_iter(chunk.iter().map(|id| id.as_str())))
            .map_err(PipelineError::query(Stage::Fetch))?;

        while let Some(row) = rows.next().map_err(PipelineError::query(Stage::Fetch))? {
            let mut record = AggregateRecord::new();
            for (i, field) in fields.iter().enumerate() {
                let value = row.get_ref(i).map_err(PipelineError::query(Stage::Fetch))?;
                record.insert(field.column(), to_json(value));
            }
            records.push(record);
        }
    }

    if records.len() < sorted.len() {
        tracing::warn!(
            requested = sorted.len(),
            fetched = records.len(),
            "Some changed ids no longer exist in the source"
        );
    }
    if records.is_empty() {
        return Ok(StageOutput::Empty);
    }

    tracing::info!(
        records = records.len(),
        fields = fields.len(),
        "Fetched aggregate records"
    );
    Ok(StageOutput::Ready(Batch::new(records)))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}
