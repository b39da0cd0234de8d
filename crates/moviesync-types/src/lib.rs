//! Shared moviesync data model.
//!
//! Pure types used by the state backend, the pipeline engine and the CLI:
//! watermarks, change sets, aggregate records, run phases and load reports.
//! Kept free of storage dependencies so every crate can share them.

#![warn(clippy::pedantic)]

pub mod change_set;
pub mod error;
pub mod field;
pub mod load;
pub mod phase;
pub mod record;
pub mod state;
pub mod watermark;
