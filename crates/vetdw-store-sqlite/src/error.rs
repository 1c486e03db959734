//! Error type for `vetdw-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] vetdw_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  /// The operational database file does not exist.
  #[error("source database not found: {0}")]
  SourceNotFound(PathBuf),

  /// A table the loader reads is absent from the operational database.
  #[error("source table missing: {0}")]
  MissingSourceTable(&'static str),

  #[error("invalid date range: {from} is after {to}")]
  InvalidDateRange { from: chrono::NaiveDate, to: chrono::NaiveDate },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
