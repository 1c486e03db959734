//! Encoding helpers between domain types and SQLite column values.
//!
//! Dates are stored as `YYYY-MM-DD` text, booleans as 0/1 integers, and
//! labels as their display strings.

use chrono::NaiveDate;
use rusqlite::types::Value;
use vetdw_core::fact::{FactKind, LineType, MissingReference, Rejection, SaleLineRef};

use crate::Result;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn date_value(d: Option<NaiveDate>) -> Value {
  d.map_or(Value::Null, |d| Value::Text(encode_date(d)))
}

pub fn text(s: &str) -> Value { Value::Text(s.to_owned()) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns read from an `etl_rejection` row.
pub struct RawRejection {
  pub fact_type:   String,
  pub source_id:   i64,
  pub line_number: Option<i64>,
  pub line_type:   Option<String>,
  pub missing:     String,
}

impl RawRejection {
  pub fn into_rejection(self) -> Result<Rejection> {
    let line = match (self.line_number, self.line_type) {
      (Some(line_number), Some(line_type)) => Some(SaleLineRef {
        line_number,
        line_type: LineType::parse(&line_type)?,
      }),
      _ => None,
    };
    Ok(Rejection {
      fact: FactKind::parse(&self.fact_type)?,
      source_id: self.source_id,
      line,
      missing: MissingReference::parse(&self.missing)?,
    })
  }
}
