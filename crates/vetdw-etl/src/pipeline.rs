//! The phase orchestrator.
//!
//! A run moves through
//! `Idle → DimensionsLoading → DimensionsCommitted → FactsLoading → Completed`
//! and drops to `Failed` from any in-progress phase. All dimensions share one
//! transaction; appointment facts and sale facts each get their own, so a
//! failure while loading sales leaves the dimension changes and appointment
//! facts committed.

use std::{fmt, time::Instant};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;
use vetdw_core::{
  dimension::{Dimension, DimensionLoad, HistoryMode, historize},
  fact::{FactKind, FactLoad, SalesLoad},
  store::{LoadContext, LoadSession, TableCount, Warehouse},
};

use crate::error::PipelineError;

// ─── Phase ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Idle,
  DimensionsLoading,
  DimensionsCommitted,
  FactsLoading,
  Completed,
  Failed,
}

impl Phase {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Idle => "idle",
      Self::DimensionsLoading => "dimensions_loading",
      Self::DimensionsCommitted => "dimensions_committed",
      Self::FactsLoading => "facts_loading",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// What a completed run did, plus the resulting warehouse row counts.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub run_id:       Uuid,
  pub today:        NaiveDate,
  pub history:      HistoryMode,
  pub dimensions:   Vec<DimensionLoad>,
  pub appointments: FactLoad,
  pub sales:        SalesLoad,
  pub tables:       Vec<TableCount>,
  pub duration_ms:  u64,
}

impl RunSummary {
  /// Dimension and fact rows inserted by this run.
  pub fn inserted(&self) -> usize {
    self.dimensions.iter().map(|d| d.inserted).sum::<usize>()
      + self.appointments.inserted
      + self.sales.inserted()
  }

  /// Source fact rows left out because a reference did not resolve.
  pub fn rejected(&self) -> usize { self.appointments.rejected_total() + self.sales.rejected_total() }

  pub fn rows(&self, table: &str) -> Option<u64> {
    self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// One loader run over a warehouse. A pipeline runs at most once; retrying
/// means building a new one.
pub struct Pipeline<W> {
  warehouse: W,
  ctx:       LoadContext,
  phase:     Phase,
}

impl<W: Warehouse> Pipeline<W> {
  pub fn new(warehouse: W, ctx: LoadContext) -> Self {
    Self { warehouse, ctx, phase: Phase::Idle }
  }

  pub fn phase(&self) -> Phase { self.phase }

  pub fn warehouse(&self) -> &W { &self.warehouse }

  pub fn into_warehouse(self) -> W { self.warehouse }

  /// Run every phase. On failure the in-flight transaction is rolled back,
  /// earlier commits stay in place, and the pipeline is left `Failed`.
  pub fn run(&mut self) -> Result<RunSummary, PipelineError<W::Error>> {
    if self.phase != Phase::Idle {
      return Err(PipelineError::NotIdle(self.phase));
    }

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("etl_run", %run_id, today = %self.ctx.today);
    let _guard = span.enter();

    let result = self.run_phases(run_id);
    if let Err(err) = &result {
      tracing::error!(phase = %err.phase(), error = %err, "run failed");
      self.transition(Phase::Failed);
    }
    result
  }

  fn run_phases(&mut self, run_id: Uuid) -> Result<RunSummary, PipelineError<W::Error>> {
    let started = Instant::now();
    self.check_calendar()?;

    self.transition(Phase::DimensionsLoading);
    let dimensions = load_dimensions(&mut self.warehouse, &self.ctx)?;
    self.transition(Phase::DimensionsCommitted);

    self.transition(Phase::FactsLoading);
    let appointments = load_appointments(&mut self.warehouse, &self.ctx)?;
    let sales = load_sales(&mut self.warehouse, &self.ctx)?;
    let tables = self
      .warehouse
      .table_counts()
      .map_err(storage(Phase::FactsLoading, "summary"))?;
    self.transition(Phase::Completed);

    for t in &tables {
      tracing::info!(table = %t.table, rows = t.rows, "table count");
    }
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(duration_ms, "run completed");

    Ok(RunSummary {
      run_id,
      today: self.ctx.today,
      history: self.ctx.history,
      dimensions,
      appointments,
      sales,
      tables,
      duration_ms,
    })
  }

  /// Warn when the calendar is empty; every fact would be rejected.
  fn check_calendar(&self) -> Result<(), PipelineError<W::Error>> {
    let counts = self
      .warehouse
      .table_counts()
      .map_err(storage(Phase::Idle, "dim_time"))?;
    if counts.iter().any(|c| c.table == "dim_time" && c.rows == 0) {
      tracing::warn!("dim_time is empty; no fact row can be linked to a date");
    }
    Ok(())
  }

  fn transition(&mut self, next: Phase) {
    tracing::info!(from = %self.phase, to = %next, "phase transition");
    self.phase = next;
  }
}

// ─── Phase bodies ────────────────────────────────────────────────────────────

fn storage<E: std::error::Error + 'static>(
  phase:  Phase,
  target: &'static str,
) -> impl FnOnce(E) -> PipelineError<E> {
  move |source| PipelineError::Storage { phase, target, source }
}

/// Roll `session` back and wrap the error that caused it.
fn abort<S: LoadSession>(
  session: S,
  phase:   Phase,
  target:  &'static str,
  source:  S::Error,
) -> PipelineError<S::Error> {
  tracing::error!(%phase, target, error = %source, "rolling back transaction");
  if let Err(err) = session.rollback() {
    tracing::error!(error = %err, "rollback failed");
  }
  PipelineError::Storage { phase, target, source }
}

fn load_dimensions<W: Warehouse>(
  warehouse: &mut W,
  ctx:       &LoadContext,
) -> Result<Vec<DimensionLoad>, PipelineError<W::Error>> {
  const PHASE: Phase = Phase::DimensionsLoading;

  let mut session = warehouse.begin().map_err(storage(PHASE, "transaction"))?;
  let mut loads = Vec::with_capacity(Dimension::ALL.len());
  for dimension in Dimension::ALL {
    match historize(&mut session, dimension, ctx) {
      Ok(load) => {
        tracing::info!(
          table = dimension.table(),
          expired = load.expired,
          changed = load.changed,
          inserted = load.inserted,
          "dimension loaded",
        );
        loads.push(load);
      }
      Err(source) => return Err(abort(session, PHASE, dimension.table(), source)),
    }
  }
  session.commit().map_err(storage(PHASE, "transaction"))?;
  Ok(loads)
}

fn load_appointments<W: Warehouse>(
  warehouse: &mut W,
  ctx:       &LoadContext,
) -> Result<FactLoad, PipelineError<W::Error>> {
  const PHASE: Phase = Phase::FactsLoading;
  let table = FactKind::Appointment.table();

  let mut session = warehouse.begin().map_err(storage(PHASE, "transaction"))?;
  let load = match session.load_appointments(ctx) {
    Ok(load) => load,
    Err(source) => return Err(abort(session, PHASE, table, source)),
  };
  session.commit().map_err(storage(PHASE, "transaction"))?;

  report(table, "appointment", &load);
  Ok(load)
}

fn load_sales<W: Warehouse>(
  warehouse: &mut W,
  ctx:       &LoadContext,
) -> Result<SalesLoad, PipelineError<W::Error>> {
  const PHASE: Phase = Phase::FactsLoading;
  let table = FactKind::Sale.table();

  let mut session = warehouse.begin().map_err(storage(PHASE, "transaction"))?;
  let load = match session.load_sales(ctx) {
    Ok(load) => load,
    Err(source) => return Err(abort(session, PHASE, table, source)),
  };
  session.commit().map_err(storage(PHASE, "transaction"))?;

  report(table, "product line", &load.products);
  report(table, "service line", &load.services);
  Ok(load)
}

fn report(table: &'static str, rows_of: &'static str, load: &FactLoad) {
  tracing::info!(
    table,
    rows_of,
    inserted = load.inserted,
    rejected = load.rejected_total(),
    "facts loaded",
  );
  for (missing, &rows) in &load.rejected {
    tracing::warn!(
      table,
      rows_of,
      missing = missing.as_str(),
      rows,
      "source rows excluded: reference has no current row",
    );
  }
}
