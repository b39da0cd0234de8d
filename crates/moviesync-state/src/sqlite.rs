//! `SQLite`-backed implementation of [`CheckpointStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Utc};
use moviesync_types::state::{CheckpointKey, PipelineId, RunRecord, RunStats, RunStatus};
use rusqlite::{Connection, OptionalExtension};

use crate::backend::CheckpointStore;
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for checkpoint tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS checkpoints (
    pipeline TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (pipeline, key)
);

CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL DEFAULT (datetime('now')),
    finished_at TEXT,
    ids_located INTEGER DEFAULT 0,
    records_fetched INTEGER DEFAULT 0,
    records_written INTEGER DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_pipeline ON sync_runs (pipeline, id);
";

/// `SQLite`-backed checkpoint storage.
///
/// Create with [`SqliteCheckpointStore::open`] for file-backed persistence
/// or [`SqliteCheckpointStore::in_memory`] for tests.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    /// Open or create a `SQLite` checkpoint database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Operation`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn =
            Connection::open(path).map_err(|e| StateError::operation("open", e))?;
        Self::init(conn)
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Operation`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StateError::operation("open", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> error::Result<Self> {
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| StateError::operation("create tables", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Format current UTC time for `SQLite` storage.
    fn now_sqlite() -> String {
        Utc::now().format(SQLITE_DATETIME_FMT).to_string()
    }

    /// Convert a `SQLite` datetime string to ISO-8601.
    fn sqlite_to_iso8601(raw: &str) -> String {
        NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT).map_or_else(
            |_| raw.to_string(),
            |ndt| format!("{}Z", ndt.format("%Y-%m-%dT%H:%M:%S")),
        )
    }

    fn parse_status(raw: &str) -> error::Result<RunStatus> {
        match raw {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(StateError::Corrupt(format!("unknown run status '{other}'"))),
        }
    }

    #[cfg(test)]
    fn checkpoint_updated_at(&self, pipeline: &PipelineId, key: CheckpointKey) -> String {
        let conn = self.lock_conn().unwrap();
        conn.query_row(
            "SELECT updated_at FROM checkpoints WHERE pipeline = ?1 AND key = ?2",
            rusqlite::params![pipeline.as_str(), key.as_str()],
            |row| row.get(0),
        )
        .unwrap()
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn pull(&self, pipeline: &PipelineId, key: CheckpointKey) -> error::Result<Option<String>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT value FROM checkpoints WHERE pipeline = ?1 AND key = ?2",
            rusqlite::params![pipeline.as_str(), key.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StateError::operation("pull", e))
    }

    fn push(&self, pipeline: &PipelineId, key: CheckpointKey, value: &str) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO checkpoints (pipeline, key, value, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(pipeline, key) \
             DO UPDATE SET value = ?3, updated_at = ?4",
            rusqlite::params![pipeline.as_str(), key.as_str(), value, Self::now_sqlite()],
        )
        .map_err(|e| StateError::operation("push", e))?;
        Ok(())
    }

    fn compare_and_set(
        &self,
        pipeline: &PipelineId,
        key: CheckpointKey,
        expected: Option<&str>,
        new_value: &str,
    ) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let now = Self::now_sqlite();

        let rows_affected = match expected {
            Some(expected_val) => conn
                .execute(
                    "UPDATE checkpoints SET value = ?1, updated_at = ?2 \
                     WHERE pipeline = ?3 AND key = ?4 AND value = ?5",
                    rusqlite::params![
                        new_value,
                        now,
                        pipeline.as_str(),
                        key.as_str(),
                        expected_val
                    ],
                )
                .map_err(|e| StateError::operation("compare_and_set", e))?,
            None => conn
                .execute(
                    "INSERT OR IGNORE INTO checkpoints (pipeline, key, value, updated_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![pipeline.as_str(), key.as_str(), new_value, now],
                )
                .map_err(|e| StateError::operation("compare_and_set", e))?,
        };

        Ok(rows_affected > 0)
    }

    fn start_run(&self, pipeline: &PipelineId) -> error::Result<i64> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sync_runs (pipeline, status) VALUES (?1, ?2)",
            rusqlite::params![pipeline.as_str(), RunStatus::Running.as_str()],
        )
        .map_err(|e| StateError::operation("start_run", e))?;
        Ok(conn.last_insert_rowid())
    }

    #[allow(clippy::cast_possible_wrap)]
    fn complete_run(&self, run_id: i64, status: RunStatus, stats: &RunStats) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE sync_runs SET status = ?1, finished_at = datetime('now'), \
             ids_located = ?2, records_fetched = ?3, records_written = ?4, error_message = ?5 \
             WHERE id = ?6",
            rusqlite::params![
                status.as_str(),
                stats.ids_located as i64,
                stats.records_fetched as i64,
                stats.records_written as i64,
                stats.error_message,
                run_id,
            ],
        )
        .map_err(|e| StateError::operation("complete_run", e))?;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn recent_runs(&self, pipeline: &PipelineId, limit: usize) -> error::Result<Vec<RunRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, status, started_at, finished_at, ids_located, records_fetched, \
                 records_written, error_message \
                 FROM sync_runs WHERE pipeline = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| StateError::operation("recent_runs: prepare", e))?;

        let rows = stmt
            .query_map(
                rusqlite::params![pipeline.as_str(), limit as i64],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .map_err(|e| StateError::operation("recent_runs: query", e))?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, status, started_at, finished_at, located, fetched, written, error_message) =
                row.map_err(|e| StateError::operation("recent_runs: read row", e))?;
            runs.push(RunRecord {
                id,
                status: Self::parse_status(&status)?,
                started_at: Self::sqlite_to_iso8601(&started_at),
                finished_at: finished_at.as_deref().map(Self::sqlite_to_iso8601),
                stats: RunStats {
                    ids_located: located as u64,
                    records_fetched: fetched as u64,
                    records_written: written as u64,
                    error_message,
                },
            });
        }
        Ok(runs)
    }
}
