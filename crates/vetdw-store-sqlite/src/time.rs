//! Calendar population for `dw.dim_time`.
//!
//! The loader only reads this table; it is seeded ahead of time for the
//! range of dates the operational data covers.

use chrono::{Datelike as _, NaiveDate, Weekday};
use rusqlite::{Connection, params};

use crate::{Error, Result, encode::encode_date};

/// `YYYYMMDD` surrogate key for a calendar date.
pub fn time_key(date: NaiveDate) -> i64 {
  i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

/// Insert one row per day in `from..=to`. Days already present are left
/// alone. Returns the number of rows inserted.
pub fn seed_time_dimension(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<usize> {
  if from > to {
    return Err(Error::InvalidDateRange { from, to });
  }

  let mut stmt = conn.prepare(
    "INSERT OR IGNORE INTO dw.dim_time
       (sk_time, date, year, quarter, month, day, weekday, is_weekend)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
  )?;

  let mut inserted = 0;
  for date in from.iter_days().take_while(|d| *d <= to) {
    let weekday = date.weekday();
    inserted += stmt.execute(params![
      time_key(date),
      encode_date(date),
      date.year(),
      (date.month() - 1) / 3 + 1,
      date.month(),
      date.day(),
      weekday.number_from_monday(),
      matches!(weekday, Weekday::Sat | Weekday::Sun),
    ])?;
  }

  tracing::debug!(%from, %to, rows = inserted, "seeded time dimension");
  Ok(inserted)
}
