//! Load strategy and the report a load returns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::phase::LoadStep;

/// How the target table is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Drop and recreate the table, then insert-or-ignore the batch.
    #[default]
    Replace,
    /// Keep the table and upsert the batch by primary key.
    Upsert,
}

impl LoadMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Upsert => "upsert",
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub mode: LoadMode,
    /// Records handed to the loader.
    pub rows_submitted: u64,
    /// Rows the insert statements reported as changed.
    pub rows_written: u64,
    /// `COUNT(*)` of the target table after the load.
    pub rows_in_table: u64,
    pub steps: Vec<LoadStep>,
}

impl LoadReport {
    /// Records skipped by insert-or-ignore (duplicate primary keys).
    #[must_use]
    pub fn rows_skipped(&self) -> u64 {
        self.rows_submitted.saturating_sub(self.rows_written)
    }
}
