//! Historized dimensions and the generic load procedure shared by all of them.
//!
//! A dimension load is a fixed sequence of steps against a [`LoadSession`]:
//! expire rows whose natural key vanished from the source, optionally expire
//! rows whose tracked attributes changed, then insert a fresh current row for
//! every natural key left without one. The sequence is the same whatever
//! storage engine sits behind the session.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::{LoadContext, LoadSession};

// ─── Dimension identity ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
  Customer,
  Pet,
  Veterinarian,
  Site,
  Product,
  Service,
}

impl Dimension {
  /// Every dimension, in load order. Dimensions are independent of each
  /// other, so the order only affects log output.
  pub const ALL: [Dimension; 6] = [
    Self::Customer,
    Self::Pet,
    Self::Veterinarian,
    Self::Site,
    Self::Product,
    Self::Service,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Customer => "customer",
      Self::Pet => "pet",
      Self::Veterinarian => "veterinarian",
      Self::Site => "site",
      Self::Product => "product",
      Self::Service => "service",
    }
  }

  /// Warehouse table holding this dimension.
  pub fn table(self) -> &'static str {
    match self {
      Self::Customer => "dim_customer",
      Self::Pet => "dim_pet",
      Self::Veterinarian => "dim_veterinarian",
      Self::Site => "dim_site",
      Self::Product => "dim_product",
      Self::Service => "dim_service",
    }
  }
}

impl fmt::Display for Dimension {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── History mode ────────────────────────────────────────────────────────────

/// How much history a dimension keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
  /// A new version opens only when a natural key has no current row (first
  /// load, or reappearance after deletion). Attribute changes on a current
  /// row are ignored and `version` is always 1.
  #[default]
  DeletionAware,
  /// Additionally closes a current row whenever a tracked source attribute
  /// changes, and numbers each new row one past the key's latest version.
  Versioned,
}

// ─── Validity ────────────────────────────────────────────────────────────────

/// The historization columns of one dimension row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
  pub surrogate_key: i64,
  pub valid_from:    NaiveDate,
  pub valid_to:      Option<NaiveDate>,
  pub version:       i64,
  pub is_current:    bool,
}

/// `valid_to` stamped on rows expired by a run on `today`.
pub fn expiry_date(today: NaiveDate) -> NaiveDate { today.pred_opt().unwrap_or(today) }

/// A broken history invariant for a single natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryViolation {
  /// More than one row is flagged current.
  MultipleCurrent(usize),
  /// A row is current but closed, or open but not current.
  InconsistentRow(i64),
  /// Row `later` starts on or before row `earlier` ends.
  Overlap { earlier: i64, later: i64 },
}

/// Check the history of one natural key: at most one current row, open rows
/// are exactly the current ones, and intervals do not overlap.
///
/// Gaps are allowed; they cover the days the key was absent from the source.
pub fn validate_history(rows: &[Validity]) -> Result<(), HistoryViolation> {
  let current = rows.iter().filter(|r| r.is_current).count();
  if current > 1 {
    return Err(HistoryViolation::MultipleCurrent(current));
  }
  if let Some(bad) = rows
    .iter()
    .find(|r| r.is_current != r.valid_to.is_none())
  {
    return Err(HistoryViolation::InconsistentRow(bad.surrogate_key));
  }

  let mut ordered: Vec<&Validity> = rows.iter().collect();
  ordered.sort_by_key(|r| (r.valid_from, r.surrogate_key));
  for pair in ordered.windows(2) {
    let (earlier, later) = (pair[0], pair[1]);
    let overlaps = match earlier.valid_to {
      Some(end) => later.valid_from <= end,
      None => true,
    };
    if overlaps {
      return Err(HistoryViolation::Overlap {
        earlier: earlier.surrogate_key,
        later:   later.surrogate_key,
      });
    }
  }
  Ok(())
}

// ─── Load procedure ──────────────────────────────────────────────────────────

/// Row counts affected by one dimension load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimensionLoad {
  pub dimension: Dimension,
  /// Current rows closed because the natural key left the source.
  pub expired:   usize,
  /// Current rows closed because a tracked attribute changed.
  pub changed:   usize,
  pub inserted:  usize,
}

impl DimensionLoad {
  pub fn is_noop(&self) -> bool { self.expired == 0 && self.changed == 0 && self.inserted == 0 }
}

/// Run the full load for `dimension` inside `session`.
///
/// Expiry always precedes insertion so a key that disappears and a key that
/// needs a fresh version are never handled out of order.
pub fn historize<S: LoadSession>(
  session:   &mut S,
  dimension: Dimension,
  ctx:       &LoadContext,
) -> Result<DimensionLoad, S::Error> {
  let expired = session.expire_missing(dimension, ctx.today)?;
  let changed = match ctx.history {
    HistoryMode::DeletionAware => 0,
    HistoryMode::Versioned => session.expire_changed(dimension, ctx.today)?,
  };
  let inserted = session.insert_new(dimension, ctx)?;
  Ok(DimensionLoad { dimension, expired, changed, inserted })
}
