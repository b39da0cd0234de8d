//! Shared fixture: a temporary directory holding source, target and state
//! databases, plus a pipeline config pointing at them.

#![allow(dead_code)]

use std::path::PathBuf;

use moviesync_engine::config::parser::parse_pipeline_str;
use moviesync_engine::config::types::PipelineConfig;
use moviesync_engine::schema::SOURCE_DDL;
use moviesync_state::SqliteCheckpointStore;
use rusqlite::{params, Connection, OptionalExtension};
use tempfile::TempDir;

pub struct SyncEnv {
    pub dir: TempDir,
    pub source: Connection,
}

impl SyncEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = Connection::open(dir.path().join("source.sqlite")).expect("open source");
        source.execute_batch(SOURCE_DDL).expect("source ddl");
        Self { dir, source }
    }

    pub fn target_path(&self) -> PathBuf {
        self.dir.path().join("target.sqlite")
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("state.db")
    }

    /// Pipeline YAML over this environment. `extra` is appended verbatim.
    pub fn yaml(&self, fields: &[&str], extra: &str) -> String {
        let host = self.dir.path().display();
        format!(
            r#"
version: "1.0"
pipeline: movies
chunk_size: 10
fields: [{fields}]
source_connection_id: movies_src
target_connection_id: movies_dst
connections:
  movies_src:
    host: "{host}"
    schema: source.sqlite
  movies_dst:
    host: "{host}"
    schema: target.sqlite
state:
  backend: sqlite
  connection: "{state}"
{extra}
"#,
            fields = fields.join(", "),
            state = self.state_path().display(),
        )
    }

    pub fn config(&self, fields: &[&str], extra: &str) -> PipelineConfig {
        parse_pipeline_str(&self.yaml(fields, extra)).expect("fixture yaml must parse")
    }

    pub fn store(&self) -> SqliteCheckpointStore {
        SqliteCheckpointStore::open(&self.state_path()).expect("open state")
    }

    pub fn film(&self, id: &str, title: &str, updated_at: &str) {
        self.source
            .execute(
                "INSERT INTO film_work (id, title, type, created_at, updated_at) \
                 VALUES (?1, ?2, 'movie', ?3, ?3)",
                params![id, title, updated_at],
            )
            .expect("insert film");
    }

    pub fn touch(&self, id: &str, updated_at: &str) {
        self.source
            .execute(
                "UPDATE film_work SET updated_at = ?2 WHERE id = ?1",
                params![id, updated_at],
            )
            .expect("touch film");
    }

    pub fn person(&self, id: &str, full_name: &str) {
        self.source
            .execute(
                "INSERT INTO person (id, full_name) VALUES (?1, ?2)",
                params![id, full_name],
            )
            .expect("insert person");
    }

    pub fn cast(&self, link_id: &str, film: &str, person: &str, role: &str) {
        self.source
            .execute(
                "INSERT INTO person_film_work (id, film_work_id, person_id, role) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![link_id, film, person, role],
            )
            .expect("link person");
    }

    /// `(id, title)` pairs of the target table, or `None` if it does not exist.
    pub fn target_titles(&self) -> Option<Vec<(String, String)>> {
        let path = self.target_path();
        if !path.exists() {
            return None;
        }
        let conn = Connection::open(path).expect("open target");
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'film_work'",
                [],
                |row| row.get(0),
            )
            .optional()
            .expect("inspect target");
        exists?;
        let mut stmt = conn
            .prepare("SELECT id, title FROM film_work ORDER BY id")
            .expect("prepare");
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows");
        Some(rows)
    }

    pub fn target_column(&self, id: &str, column: &str) -> String {
        let conn = Connection::open(self.target_path()).expect("open target");
        conn.query_row(
            &format!("SELECT {column} FROM film_work WHERE id = ?1"),
            [id],
            |row| row.get(0),
        )
        .expect("read column")
    }
}

pub fn pairs(rows: &[(&str, &str)]) -> Vec<(String, String)> {
    rows.iter()
        .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
        .collect()
}
