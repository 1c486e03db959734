//! [`SqliteWarehouse`]: the SQLite implementation of [`Warehouse`].

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension as _, Transaction, params};

use vetdw_core::{
  dimension::{Dimension, Validity},
  fact::{FactLoad, Rejection, SalesLoad},
  store::{LoadContext, LoadSession, TableCount, Warehouse},
};

use crate::{
  Error, Result, dimension, encode::RawRejection, fact,
  schema::{REQUIRED_SOURCE_TABLES, WAREHOUSE_SCHEMA, WAREHOUSE_TABLES},
  time,
};

// ─── Warehouse ───────────────────────────────────────────────────────────────

/// One connection to the operational database with the warehouse attached
/// as `dw`.
pub struct SqliteWarehouse {
  conn: Connection,
}

impl SqliteWarehouse {
  /// Open the operational database at `source` and attach (or create) the
  /// warehouse at `warehouse`.
  pub fn open(source: impl AsRef<Path>, warehouse: impl AsRef<Path>) -> Result<Self> {
    let source = source.as_ref();
    if !source.exists() {
      return Err(Error::SourceNotFound(source.to_path_buf()));
    }

    let conn = Connection::open(source)?;
    conn.execute(
      "ATTACH DATABASE ?1 AS dw",
      params![warehouse.as_ref().to_string_lossy()],
    )?;
    let store = Self::init(conn)?;
    store.verify_source()?;
    tracing::info!(
      source = %source.display(),
      warehouse = %warehouse.as_ref().display(),
      "opened warehouse",
    );
    Ok(store)
  }

  /// An empty in-memory source with an in-memory warehouse attached. The
  /// caller provisions the source tables before the first load.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    conn.execute("ATTACH DATABASE ':memory:' AS dw", [])?;
    Self::init(conn)
  }

  fn init(conn: Connection) -> Result<Self> {
    conn.execute_batch(WAREHOUSE_SCHEMA)?;
    Ok(Self { conn })
  }

  /// Fail with [`Error::MissingSourceTable`] unless every operational table
  /// the loader reads is present.
  pub fn verify_source(&self) -> Result<()> {
    let mut stmt = self
      .conn
      .prepare("SELECT 1 FROM main.sqlite_master WHERE type = 'table' AND name = ?1")?;
    for &table in REQUIRED_SOURCE_TABLES {
      let found = stmt.query_row(params![table], |_| Ok(())).optional()?;
      if found.is_none() {
        return Err(Error::MissingSourceTable(table));
      }
    }
    Ok(())
  }

  /// The underlying connection, for provisioning and inspection.
  pub fn connection(&self) -> &Connection { &self.conn }

  /// Populate `dw.dim_time` for `from..=to` in its own transaction.
  pub fn seed_time_dimension(&mut self, from: NaiveDate, to: NaiveDate) -> Result<usize> {
    let tx = self.conn.transaction()?;
    let inserted = time::seed_time_dimension(&tx, from, to)?;
    tx.commit()?;
    Ok(inserted)
  }

  /// Every version recorded for one natural key of `dimension`.
  pub fn history(&self, dimension: Dimension, natural_key: i64) -> Result<Vec<Validity>> {
    dimension::history(&self.conn, dimension::table(dimension), natural_key)
  }

  /// The orphan snapshot left by the most recent fact loads.
  pub fn rejections(&self) -> Result<Vec<Rejection>> {
    let mut stmt = self.conn.prepare(
      "SELECT fact_type, source_id, line_number, line_type, missing
       FROM dw.etl_rejection
       ORDER BY fact_type, source_id, line_type, line_number",
    )?;
    let raw = stmt
      .query_map([], |row| {
        Ok(RawRejection {
          fact_type:   row.get(0)?,
          source_id:   row.get(1)?,
          line_number: row.get(2)?,
          line_type:   row.get(3)?,
          missing:     row.get(4)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(RawRejection::into_rejection).collect()
  }
}

impl Warehouse for SqliteWarehouse {
  type Error = Error;
  type Session<'a> = SqliteSession<'a>;

  fn begin(&mut self) -> Result<SqliteSession<'_>> {
    let tx = self.conn.transaction()?;
    Ok(SqliteSession { tx })
  }

  fn table_counts(&self) -> Result<Vec<TableCount>> {
    WAREHOUSE_TABLES
      .iter()
      .map(|&table| {
        let rows: i64 =
          self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM dw.{table}"), [], |r| r.get(0))?;
        Ok(TableCount { table: table.to_owned(), rows: rows.max(0) as u64 })
      })
      .collect()
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// An open transaction spanning the source and the warehouse.
pub struct SqliteSession<'a> {
  tx: Transaction<'a>,
}

impl LoadSession for SqliteSession<'_> {
  type Error = Error;

  fn expire_missing(&mut self, dimension: Dimension, today: NaiveDate) -> Result<usize> {
    let rows = dimension::expire_missing(&self.tx, dimension::table(dimension), today)?;
    if rows > 0 {
      tracing::debug!(%dimension, rows, "expired rows missing from source");
    }
    Ok(rows)
  }

  fn expire_changed(&mut self, dimension: Dimension, today: NaiveDate) -> Result<usize> {
    let rows = dimension::expire_changed(&self.tx, dimension::table(dimension), today)?;
    if rows > 0 {
      tracing::debug!(%dimension, rows, "expired changed rows");
    }
    Ok(rows)
  }

  fn insert_new(&mut self, dimension: Dimension, ctx: &LoadContext) -> Result<usize> {
    dimension::insert_new(&self.tx, dimension::table(dimension), ctx)
  }

  fn load_appointments(&mut self, ctx: &LoadContext) -> Result<FactLoad> {
    fact::load_appointments(&self.tx, ctx)
  }

  fn load_sales(&mut self, ctx: &LoadContext) -> Result<SalesLoad> {
    fact::load_sales(&self.tx, ctx)
  }

  fn commit(self) -> Result<()> {
    self.tx.commit()?;
    Ok(())
  }

  fn rollback(self) -> Result<()> {
    self.tx.rollback()?;
    Ok(())
  }
}
