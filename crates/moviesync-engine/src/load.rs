//! Target loading: replace (or upsert) the `film_work` table with a batch.
//!
//! All steps run in a single transaction, so a failure at any point leaves
//! the target exactly as it was before the load started.

use moviesync_types::load::{LoadMode, LoadReport};
use moviesync_types::phase::{LoadStep, Stage};
use moviesync_types::record::{AggregateRecord, Batch};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Transaction};
use serde_json::Value;

use crate::connection::open_target;
use crate::context::SyncContext;
use crate::errors::PipelineError;
use crate::schema::{create_target_table_sql, FILM_TABLE, PRIMARY_KEY, TARGET_COLUMNS};

/// Load a batch into the context's target database.
///
/// # Errors
///
/// See [`load_into`]; additionally [`PipelineError::Connection`] or
/// [`PipelineError::Io`] if the target cannot be opened.
pub fn load(ctx: &SyncContext, batch: &Batch) -> Result<LoadReport, PipelineError> {
    let mut conn = open_target(&ctx.target)?;
    load_into(&mut conn, batch, ctx.load_mode)
}

/// Write `batch` to `film_work` on `conn`.
///
/// The batch shape is checked before anything is written: every record must
/// carry the same fields, `id` must be among them, and every field must be a
/// target column.
///
/// # Errors
///
/// Returns [`PipelineError::SchemaMismatch`] for a malformed batch, or
/// [`PipelineError::Query`] if a statement fails (the transaction is rolled
/// back).
pub fn load_into(
    conn: &mut Connection,
    batch: &Batch,
    mode: LoadMode,
) -> Result<LoadReport, PipelineError> {
    let columns = checked_columns(batch)?;
    let rows_submitted = batch.len() as u64;
    if batch.is_empty() {
        tracing::info!("No records need to be updated");
        return Ok(LoadReport {
            mode,
            rows_submitted,
            rows_written: 0,
            rows_in_table: 0,
            steps: Vec::new(),
        });
    }

    let tx = conn.transaction().map_err(PipelineError::query(Stage::Load))?;
    let mut steps = Vec::with_capacity(4);

    match mode {
        LoadMode::Replace => {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {FILM_TABLE}"))
                .map_err(PipelineError::query(Stage::Load))?;
            steps.push(LoadStep::Dropped);
            tracing::info!(table = FILM_TABLE, "Dropped target table");

            tx.execute_batch(&create_target_table_sql(false))
                .map_err(PipelineError::query(Stage::Load))?;
        }
        LoadMode::Upsert => {
            tx.execute_batch(&create_target_table_sql(true))
                .map_err(PipelineError::query(Stage::Load))?;
        }
    }
    steps.push(LoadStep::Created);
    tracing::info!(table = FILM_TABLE, mode = %mode, "Created target table");

    let rows_written = insert_records(&tx, &columns, batch.records(), mode)?;
    steps.push(LoadStep::Inserted);
    tracing::info!(
        table = FILM_TABLE,
        rows_submitted,
        rows_written,
        "Inserted records"
    );

    let rows_in_table = count_rows(&tx)?;
    steps.push(LoadStep::Verified);

    tx.commit().map_err(PipelineError::query(Stage::Load))?;

    let report = LoadReport {
        mode,
        rows_submitted,
        rows_written,
        rows_in_table,
        steps,
    };
    if mode == LoadMode::Replace && rows_in_table != rows_submitted {
        tracing::warn!(
            rows_submitted,
            rows_in_table,
            rows_skipped = report.rows_skipped(),
            "Target row count differs from batch size; duplicate ids were ignored"
        );
    }
    tracing::info!(table = FILM_TABLE, rows_in_table, "Verified target row count");
    Ok(report)
}

fn checked_columns(batch: &Batch) -> Result<Vec<String>, PipelineError> {
    batch.check_shape()?;
    let columns: Vec<String> = batch.fields().into_iter().map(str::to_string).collect();
    if columns.is_empty() {
        return Ok(columns);
    }
    if !columns.iter().any(|c| c == PRIMARY_KEY) {
        return Err(PipelineError::SchemaMismatch(format!(
            "batch has no '{PRIMARY_KEY}' field"
        )));
    }
    let unknown: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| !TARGET_COLUMNS.contains(c))
        .collect();
    if !unknown.is_empty() {
        return Err(PipelineError::SchemaMismatch(format!(
            "unknown target column(s): {}",
            unknown.join(", ")
        )));
    }
    Ok(columns)
}

fn insert_sql(columns: &[String], mode: LoadMode) -> String {
    let column_list = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    match mode {
        LoadMode::Replace => format!(
            "INSERT OR IGNORE INTO {FILM_TABLE} ({column_list}) VALUES ({placeholders})"
        ),
        LoadMode::Upsert => {
            let updates: Vec<String> = columns
                .iter()
                .filter(|c| c.as_str() != PRIMARY_KEY)
                .map(|c| format!("\"{c}\" = excluded.\"{c}\""))
                .collect();
            let action = if updates.is_empty() {
                "DO NOTHING".to_string()
            } else {
                format!("DO UPDATE SET {}", updates.join(", "))
            };
            format!(
                "INSERT INTO {FILM_TABLE} ({column_list}) VALUES ({placeholders}) \
                 ON CONFLICT({PRIMARY_KEY}) {action}"
            )
        }
    }
}

fn insert_records(
    tx: &Transaction<'_>,
    columns: &[String],
    records: &[AggregateRecord],
    mode: LoadMode,
) -> Result<u64, PipelineError> {
    let mut stmt = tx
        .prepare(&insert_sql(columns, mode))
        .map_err(PipelineError::query(Stage::Load))?;

    let mut written = 0u64;
    for record in records {
        let values = columns
            .iter()
            .map(|c| record.get(c).map_or(SqlValue::Null, to_sql_value));
        let changed = stmt
            .execute(params_from_iter(values))
            .map_err(PipelineError::query(Stage::Load))?;
        written += changed as u64;
    }
    Ok(written)
}

#[allow(clippy::cast_sign_loss)]
fn count_rows(tx: &Transaction<'_>) -> Result<u64, PipelineError> {
    let count: i64 = tx
        .query_row(&format!("SELECT COUNT(*) FROM {FILM_TABLE}"), [], |row| {
            row.get(0)
        })
        .map_err(PipelineError::query(Stage::Load))?;
    Ok(count as u64)
}

#[allow(clippy::cast_precision_loss)]
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n.as_i64().map_or_else(
            || SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            SqlValue::Integer,
        ),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> AggregateRecord {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn film(id: &str, title: &str) -> AggregateRecord {
        record(&[("id", json!(id)), ("title", json!(title))])
    }

    fn rows(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(id, title)| ((*id).to_string(), (*title).to_string()))
            .collect()
    }

    fn titles(conn: &Connection) -> Vec<(String, String)> {
        let mut stmt = conn
            .prepare("SELECT id, title FROM film_work ORDER BY id")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_replace_load_reports_all_steps() {
        let mut conn = Connection::open_in_memory().unwrap();
        let batch = Batch::new(vec![film("a", "A"), film("b", "B")]);

        let report = load_into(&mut conn, &batch, LoadMode::Replace).unwrap();
        assert_eq!(
            report.steps,
            [LoadStep::Dropped, LoadStep::Created, LoadStep::Inserted, LoadStep::Verified]
        );
        assert_eq!(report.rows_submitted, 2);
        assert_eq!(report.rows_written, 2);
        assert_eq!(report.rows_in_table, 2);
        assert_eq!(titles(&conn), rows(&[("a", "A"), ("b", "B")]));
    }

    #[test]
    fn test_replace_discards_previous_contents() {
        let mut conn = Connection::open_in_memory().unwrap();
        load_into(&mut conn, &Batch::new(vec![film("old", "Old")]), LoadMode::Replace).unwrap();
        load_into(&mut conn, &Batch::new(vec![film("new", "New")]), LoadMode::Replace).unwrap();
        assert_eq!(titles(&conn), rows(&[("new", "New")]));
    }

    #[test]
    fn test_duplicate_ids_are_ignored_not_fatal() {
        let mut conn = Connection::open_in_memory().unwrap();
        let batch = Batch::new(vec![film("a", "first"), film("a", "second")]);
        let report = load_into(&mut conn, &batch, LoadMode::Replace).unwrap();
        assert_eq!(report.rows_written, 1);
        assert_eq!(report.rows_skipped(), 1);
        assert_eq!(report.rows_in_table, 1);
        assert_eq!(titles(&conn), rows(&[("a", "first")]));
    }

    #[test]
    fn test_unrequested_columns_take_defaults() {
        let mut conn = Connection::open_in_memory().unwrap();
        load_into(&mut conn, &Batch::new(vec![film("a", "A")]), LoadMode::Replace).unwrap();
        let (description, actors, rating): (String, String, f64) = conn
            .query_row(
                "SELECT description, actors, rating FROM film_work WHERE id = 'a'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(description, "DESCRIPTION");
        assert_eq!(actors, "");
        assert!((rating - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_batch_leaves_target_untouched() {
        let mut conn = Connection::open_in_memory().unwrap();
        load_into(&mut conn, &Batch::new(vec![film("keep", "Keep")]), LoadMode::Replace).unwrap();

        let bad = Batch::new(vec![film("a", "A"), record(&[("id", json!("b"))])]);
        let err = load_into(&mut conn, &bad, LoadMode::Replace).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
        assert_eq!(titles(&conn), rows(&[("keep", "Keep")]));
    }

    #[test]
    fn test_unknown_column_and_missing_id_are_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        let unknown = Batch::new(vec![record(&[("id", json!("a")), ("budget", json!(1))])]);
        let err = load_into(&mut conn, &unknown, LoadMode::Replace).unwrap_err();
        assert!(err.to_string().contains("budget"));

        let no_id = Batch::new(vec![record(&[("title", json!("A"))])]);
        let err = load_into(&mut conn, &no_id, LoadMode::Replace).unwrap_err();
        assert!(err.to_string().contains("no 'id' field"));
    }

    #[test]
    fn test_failed_insert_rolls_back_whole_batch() {
        let mut conn = Connection::open_in_memory().unwrap();
        load_into(&mut conn, &Batch::new(vec![film("keep", "Keep")]), LoadMode::Upsert).unwrap();

        // A NULL primary key violates NOT NULL on the plain INSERT path.
        let bad = Batch::new(vec![
            film("a", "A"),
            record(&[("id", Value::Null), ("title", json!("X"))]),
        ]);
        let err = load_into(&mut conn, &bad, LoadMode::Upsert).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Load));
        assert_eq!(titles(&conn), rows(&[("keep", "Keep")]));
    }

    #[test]
    fn test_null_id_is_ignored_on_replace() {
        let mut conn = Connection::open_in_memory().unwrap();
        let batch = Batch::new(vec![
            film("a", "A"),
            record(&[("id", Value::Null), ("title", json!("X"))]),
        ]);
        let report = load_into(&mut conn, &batch, LoadMode::Replace).unwrap();
        assert_eq!(report.rows_in_table, 1);
        assert_eq!(report.rows_skipped(), 1);
    }

    #[test]
    fn test_upsert_preserves_rows_outside_batch() {
        let mut conn = Connection::open_in_memory().unwrap();
        load_into(
            &mut conn,
            &Batch::new(vec![film("a", "A"), film("b", "B")]),
            LoadMode::Upsert,
        )
        .unwrap();

        let report = load_into(
            &mut conn,
            &Batch::new(vec![film("b", "B2"), film("c", "C")]),
            LoadMode::Upsert,
        )
        .unwrap();
        assert_eq!(report.steps.first(), Some(&LoadStep::Created));
        assert_eq!(report.rows_in_table, 3);
        assert_eq!(titles(&conn), rows(&[("a", "A"), ("b", "B2"), ("c", "C")]));
    }

    #[test]
    fn test_upsert_with_only_ids_does_nothing_on_conflict() {
        let sql = insert_sql(&["id".to_string()], LoadMode::Upsert);
        assert!(sql.ends_with("ON CONFLICT(id) DO NOTHING"));
        let mut conn = Connection::open_in_memory().unwrap();
        let batch = Batch::new(vec![record(&[("id", json!("a"))])]);
        load_into(&mut conn, &batch, LoadMode::Upsert).unwrap();
        let report = load_into(&mut conn, &batch, LoadMode::Upsert).unwrap();
        assert_eq!(report.rows_written, 0);
        assert_eq!(report.rows_in_table, 1);
    }

    #[test]
    fn test_json_values_map_to_sql_types() {
        assert_eq!(to_sql_value(&json!(null)), SqlValue::Null);
        assert_eq!(to_sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&json!(3)), SqlValue::Integer(3));
        assert_eq!(to_sql_value(&json!(2.5)), SqlValue::Real(2.5));
        assert_eq!(to_sql_value(&json!("x")), SqlValue::Text("x".into()));
        assert_eq!(to_sql_value(&json!([1])), SqlValue::Text("[1]".into()));
    }
}
