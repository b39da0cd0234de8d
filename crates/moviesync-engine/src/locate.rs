//! Change-set location: which films changed since the watermark.

use moviesync_types::change_set::{ChangeSet, EntityId};
use moviesync_types::phase::{Stage, StageOutput};
use moviesync_types::watermark::Watermark;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};

use crate::connection::open_source;
use crate::context::SyncContext;
use crate::errors::PipelineError;

/// Scalar registered on the source connection: `updated_at` as epoch
/// microseconds, or NULL when the value is not a timestamp.
const EPOCH_FN: &str = "moviesync_epoch";

const LOCATE_BY_EPOCH_SQL: &str = "SELECT id, updated_at FROM film_work \
     WHERE moviesync_epoch(updated_at) >= ?1 \
     ORDER BY moviesync_epoch(updated_at), id \
     LIMIT ?2";

const COUNT_UNCONVERTIBLE_SQL: &str = "SELECT count(*) FROM film_work \
     WHERE updated_at IS NOT NULL AND moviesync_epoch(updated_at) IS NULL";

/// Used when the watermark could not be parsed: the raw text is compared
/// against the column as stored. Blobs never yield a candidate watermark.
const LOCATE_BY_TEXT_SQL: &str = "SELECT id, updated_at FROM film_work \
     WHERE typeof(updated_at) != 'blob' AND updated_at >= ?1 \
     ORDER BY updated_at, id \
     LIMIT ?2";

/// Locate changed films using the context's source connection.
///
/// A missing watermark means "sync from the beginning".
///
/// # Errors
///
/// Returns [`PipelineError::Connection`] if the source cannot be opened, or
/// [`PipelineError::Query`] if the query fails.
pub fn locate(
    ctx: &SyncContext,
    watermark: Option<&Watermark>,
) -> Result<StageOutput<ChangeSet>, PipelineError> {
    let conn = open_source(&ctx.source)?;
    locate_in(&conn, watermark.unwrap_or(&Watermark::MIN), ctx.chunk_size)
}

/// Ids of at most `chunk_size` films with `updated_at >= watermark`,
/// ascending by `updated_at` (ties by id).
///
/// The candidate watermark is the `updated_at` of the last row returned.
/// The bound is floored to milliseconds, so rows at the boundary are
/// re-read on the next run rather than skipped. Rows whose `updated_at`
/// is not a timestamp are left out and counted in a warning.
///
/// # Errors
///
/// Returns [`PipelineError::Query`] if the statement fails.
pub fn locate_in(
    conn: &Connection,
    watermark: &Watermark,
    chunk_size: usize,
) -> Result<StageOutput<ChangeSet>, PipelineError> {
    let limit = i64::try_from(chunk_size).unwrap_or(i64::MAX);

    let rows = match watermark.query_bound_micros() {
        Some(bound) => {
            register_epoch_fn(conn)?;
            warn_unconvertible(conn)?;
            query_changed(conn, LOCATE_BY_EPOCH_SQL, params![bound, limit])?
        }
        None => {
            tracing::warn!(
                watermark = %watermark,
                "Watermark is not a timestamp; comparing it as text"
            );
            query_changed(conn, LOCATE_BY_TEXT_SQL, params![watermark.to_string(), limit])?
        }
    };

    let candidate = rows.last().and_then(|(_, updated_at)| updated_at.clone());
    let change_set = ChangeSet::new(rows.into_iter().map(|(id, _)| id), candidate);

    if change_set.is_empty() {
        tracing::info!(watermark = %watermark, "No records need to be updated");
        return Ok(StageOutput::Empty);
    }

    tracing::info!(
        watermark = %watermark,
        ids = change_set.len(),
        candidate = change_set
            .candidate_watermark()
            .map(ToString::to_string)
            .as_deref(),
        "Located changed records"
    );
    Ok(StageOutput::Ready(change_set))
}

fn register_epoch_fn(conn: &Connection) -> Result<(), PipelineError> {
    conn.create_scalar_function(
        EPOCH_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(value_to_watermark(ctx.get_raw(0)).and_then(|wm| wm.epoch_micros())),
    )
    .map_err(PipelineError::query(Stage::Locate))
}

fn warn_unconvertible(conn: &Connection) -> Result<(), PipelineError> {
    let skipped: i64 = conn
        .query_row(COUNT_UNCONVERTIBLE_SQL, [], |row| row.get(0))
        .map_err(PipelineError::query(Stage::Locate))?;
    if skipped > 0 {
        tracing::warn!(
            rows = skipped,
            "Skipping film_work rows whose updated_at is not a timestamp"
        );
    }
    Ok(())
}

fn query_changed(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<(EntityId, Option<Watermark>)>, PipelineError> {
    let mut stmt = conn.prepare(sql).map_err(PipelineError::query(Stage::Locate))?;
    let mut rows = stmt
        .query(params)
        .map_err(PipelineError::query(Stage::Locate))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(PipelineError::query(Stage::Locate))? {
        let id = row.get_ref(0).map_err(PipelineError::query(Stage::Locate))?;
        let Some(id) = value_to_id(id) else {
            tracing::warn!("Skipping film_work row with NULL id");
            continue;
        };
        let updated_at = row.get_ref(1).map_err(PipelineError::query(Stage::Locate))?;
        out.push((id, value_to_watermark(updated_at)));
    }
    Ok(out)
}

fn value_to_id(value: ValueRef<'_>) -> Option<EntityId> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(EntityId::new(i.to_string())),
        ValueRef::Real(f) => Some(EntityId::new(f.to_string())),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Some(EntityId::new(String::from_utf8_lossy(t).into_owned()))
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn value_to_watermark(value: ValueRef<'_>) -> Option<Watermark> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(secs) => Watermark::from_epoch_secs(secs as f64),
        ValueRef::Real(secs) => Watermark::from_epoch_secs(secs),
        ValueRef::Text(t) => Some(Watermark::parse_lenient(&String::from_utf8_lossy(t))),
    }
}
