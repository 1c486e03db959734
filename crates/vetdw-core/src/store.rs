//! The `Warehouse` and `LoadSession` traits and the per-run load context.
//!
//! Storage backends (e.g. `vetdw-store-sqlite`) implement these traits. The
//! orchestrator depends only on this abstraction and owns every transaction
//! boundary: one [`LoadSession`] is one transaction.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
  dimension::{Dimension, HistoryMode},
  fact::{FactLoad, FactRules, SalesLoad},
};

// ─── Context ─────────────────────────────────────────────────────────────────

/// Everything a load step needs besides the data itself.
#[derive(Debug, Clone)]
pub struct LoadContext {
  /// Reference date for validity stamps and date-relative attributes.
  pub today:             NaiveDate,
  pub history:           HistoryMode,
  pub rules:             FactRules,
  /// Persist the orphan snapshot alongside each fact load.
  pub record_rejections: bool,
}

impl LoadContext {
  pub fn new(today: NaiveDate) -> Self {
    Self {
      today,
      history: HistoryMode::default(),
      rules: FactRules::default(),
      record_rejections: true,
    }
  }
}

/// Row count of one warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
  pub table: String,
  pub rows:  u64,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// A warehouse backend the pipeline can open transactions against.
pub trait Warehouse {
  type Error: std::error::Error + Send + Sync + 'static;

  type Session<'a>: LoadSession<Error = Self::Error>
  where
    Self: 'a;

  /// Open a transaction. Nothing done through the session is visible to
  /// other sessions until [`LoadSession::commit`].
  fn begin(&mut self) -> Result<Self::Session<'_>, Self::Error>;

  /// Row counts for every warehouse table, the time dimension included.
  fn table_counts(&self) -> Result<Vec<TableCount>, Self::Error>;
}

/// One open warehouse transaction.
///
/// Dropping a session without committing rolls it back.
pub trait LoadSession {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Close every current row of `dimension` whose natural key is no longer
  /// in the source. Returns the number of rows closed.
  fn expire_missing(&mut self, dimension: Dimension, today: NaiveDate) -> Result<usize, Self::Error>;

  /// Close every current row of `dimension` whose tracked source attributes
  /// differ from the source row. Returns the number of rows closed.
  fn expire_changed(&mut self, dimension: Dimension, today: NaiveDate) -> Result<usize, Self::Error>;

  /// Insert a current row for every source row of `dimension` without one.
  fn insert_new(&mut self, dimension: Dimension, ctx: &LoadContext) -> Result<usize, Self::Error>;

  /// Insert appointment facts not yet in the warehouse.
  fn load_appointments(&mut self, ctx: &LoadContext) -> Result<FactLoad, Self::Error>;

  /// Insert product and service sale lines not yet in the warehouse.
  fn load_sales(&mut self, ctx: &LoadContext) -> Result<SalesLoad, Self::Error>;

  fn commit(self) -> Result<(), Self::Error>;

  fn rollback(self) -> Result<(), Self::Error>;
}
