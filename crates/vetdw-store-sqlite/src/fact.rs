//! Append-only loads into `dw.fact_appointment` and `dw.fact_sale`.
//!
//! Candidate source rows are those without a fact row yet. Each candidate is
//! resolved against the time dimension and the *current* row of every
//! dimension it references; candidates with a gap are excluded and reported
//! instead of inserted.

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use vetdw_core::{
  fact::{
    AppointmentFlags, FactKind, FactLoad, FactRules, LineType, MissingReference, Rejection,
    SaleLineMeasures, SaleLineRef, SalesLoad, first_missing,
  },
  store::LoadContext,
};

use crate::{Result, encode::encode_date};

// ─── Appointments ────────────────────────────────────────────────────────────

const APPOINTMENT_CANDIDATES: &str = "
SELECT a.appointment_id, a.time, a.reason, a.status, a.duration_minutes, a.cost,
       t.sk_time, dp.sk_pet, dc.sk_customer, dv.sk_veterinarian, ds.sk_site,
       EXISTS (
         SELECT 1 FROM main.appointment AS e
         WHERE e.pet_id = a.pet_id AND date(e.date) < date(a.date)
       ) AS has_earlier_visit
FROM main.appointment AS a
LEFT JOIN dw.dim_time         AS t  ON t.date = date(a.date)
LEFT JOIN main.pet            AS p  ON p.pet_id = a.pet_id
LEFT JOIN dw.dim_pet          AS dp ON dp.pet_id = p.pet_id AND dp.is_current = 1
LEFT JOIN dw.dim_customer     AS dc ON dc.customer_id = p.customer_id AND dc.is_current = 1
LEFT JOIN dw.dim_veterinarian AS dv ON dv.veterinarian_id = a.veterinarian_id AND dv.is_current = 1
LEFT JOIN dw.dim_site         AS ds ON ds.site_id = a.site_id AND ds.is_current = 1
WHERE NOT EXISTS (
  SELECT 1 FROM dw.fact_appointment AS f WHERE f.appointment_id = a.appointment_id
)
ORDER BY a.appointment_id";

const INSERT_APPOINTMENT: &str = "
INSERT INTO dw.fact_appointment (
  sk_time, sk_customer, sk_pet, sk_veterinarian, sk_site,
  appointment_id, time, reason, status, duration_minutes, cost,
  is_first_visit, is_emergency, is_checkup, attended
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)";

struct AppointmentCandidate {
  appointment_id:    i64,
  time:              Option<String>,
  reason:            Option<String>,
  status:            Option<String>,
  duration_minutes:  Option<i64>,
  cost:              Option<f64>,
  sk_time:           Option<i64>,
  sk_pet:            Option<i64>,
  sk_customer:       Option<i64>,
  sk_veterinarian:   Option<i64>,
  sk_site:           Option<i64>,
  has_earlier_visit: bool,
}

impl AppointmentCandidate {
  fn missing(&self) -> Option<MissingReference> {
    first_missing(&[
      (MissingReference::Time, self.sk_time),
      (MissingReference::Pet, self.sk_pet),
      (MissingReference::Customer, self.sk_customer),
      (MissingReference::Veterinarian, self.sk_veterinarian),
      (MissingReference::Site, self.sk_site),
    ])
  }

  fn flags(&self, rules: &FactRules) -> AppointmentFlags {
    AppointmentFlags::evaluate(
      self.reason.as_deref(),
      self.status.as_deref(),
      self.has_earlier_visit,
      rules,
    )
  }
}

pub fn load_appointments(conn: &Connection, ctx: &LoadContext) -> Result<FactLoad> {
  let candidates: Vec<AppointmentCandidate> = {
    let mut stmt = conn.prepare(APPOINTMENT_CANDIDATES)?;
    stmt
      .query_map([], |row| {
        Ok(AppointmentCandidate {
          appointment_id:    row.get(0)?,
          time:              row.get(1)?,
          reason:            row.get(2)?,
          status:            row.get(3)?,
          duration_minutes:  row.get(4)?,
          cost:              row.get(5)?,
          sk_time:           row.get(6)?,
          sk_pet:            row.get(7)?,
          sk_customer:       row.get(8)?,
          sk_veterinarian:   row.get(9)?,
          sk_site:           row.get(10)?,
          has_earlier_visit: row.get(11)?,
        })
      })?
      .collect::<rusqlite::Result<_>>()?
  };

  let mut load = FactLoad::default();
  let mut rejections = Vec::new();
  let mut insert = conn.prepare(INSERT_APPOINTMENT)?;

  for c in &candidates {
    if let Some(missing) = c.missing() {
      load.reject(missing);
      rejections.push(Rejection {
        fact: FactKind::Appointment,
        source_id: c.appointment_id,
        line: None,
        missing,
      });
      continue;
    }

    let flags = c.flags(&ctx.rules);
    insert.execute(params![
      c.sk_time,
      c.sk_customer,
      c.sk_pet,
      c.sk_veterinarian,
      c.sk_site,
      c.appointment_id,
      c.time,
      c.reason,
      c.status,
      c.duration_minutes,
      c.cost,
      flags.is_first_visit,
      flags.is_emergency,
      flags.is_checkup,
      flags.attended,
    ])?;
    load.inserted += 1;
  }

  if ctx.record_rejections {
    replace_rejections(conn, FactKind::Appointment, &rejections, ctx.today)?;
  }
  Ok(load)
}

// ─── Sales ───────────────────────────────────────────────────────────────────

const PRODUCT_LINE_CANDIDATES: &str = "
SELECT s.sale_id, l.line_id, s.payment_type, s.status,
       l.quantity, l.unit_price, pr.cost, l.subtotal, l.discount,
       t.sk_time, dc.sk_customer, ds.sk_site, dp.sk_product
FROM main.sale AS s
JOIN main.sale_product_line AS l  ON l.sale_id = s.sale_id
LEFT JOIN main.product      AS pr ON pr.product_id = l.product_id
LEFT JOIN dw.dim_time       AS t  ON t.date = date(s.sale_date)
LEFT JOIN dw.dim_customer   AS dc ON dc.customer_id = s.customer_id AND dc.is_current = 1
LEFT JOIN dw.dim_site       AS ds ON ds.site_id = s.site_id AND ds.is_current = 1
LEFT JOIN dw.dim_product    AS dp ON dp.product_id = pr.product_id AND dp.is_current = 1
WHERE NOT EXISTS (
  SELECT 1 FROM dw.fact_sale AS f
  WHERE f.sale_id = s.sale_id AND f.line_number = l.line_id AND f.line_type = ?1
)
ORDER BY s.sale_id, l.line_id";

const SERVICE_LINE_CANDIDATES: &str = "
SELECT s.sale_id, l.line_id, s.payment_type, s.status,
       l.quantity, l.unit_price, sv.cost, l.subtotal, NULL,
       t.sk_time, dc.sk_customer, ds.sk_site, dv.sk_service
FROM main.sale AS s
JOIN main.sale_service_line AS l  ON l.sale_id = s.sale_id
LEFT JOIN main.service      AS sv ON sv.service_id = l.service_id
LEFT JOIN dw.dim_time       AS t  ON t.date = date(s.sale_date)
LEFT JOIN dw.dim_customer   AS dc ON dc.customer_id = s.customer_id AND dc.is_current = 1
LEFT JOIN dw.dim_site       AS ds ON ds.site_id = s.site_id AND ds.is_current = 1
LEFT JOIN dw.dim_service    AS dv ON dv.service_id = sv.service_id AND dv.is_current = 1
WHERE NOT EXISTS (
  SELECT 1 FROM dw.fact_sale AS f
  WHERE f.sale_id = s.sale_id AND f.line_number = l.line_id AND f.line_type = ?1
)
ORDER BY s.sale_id, l.line_id";

const INSERT_SALE_LINE: &str = "
INSERT INTO dw.fact_sale (
  sk_time, sk_customer, sk_site, sk_product, sk_service,
  sale_id, line_number, line_type, payment_type, status,
  quantity, unit_price, unit_cost, subtotal, discount, total,
  margin_unit, margin_total
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)";

struct SaleLineCandidate {
  sale_id:      i64,
  line_number:  i64,
  payment_type: Option<String>,
  status:       Option<String>,
  quantity:     i64,
  unit_price:   f64,
  unit_cost:    Option<f64>,
  subtotal:     f64,
  discount:     Option<f64>,
  sk_time:      Option<i64>,
  sk_customer:  Option<i64>,
  sk_site:      Option<i64>,
  /// `sk_product` or `sk_service`, depending on the line type.
  sk_item:      Option<i64>,
}

impl SaleLineCandidate {
  fn missing(&self, line_type: LineType) -> Option<MissingReference> {
    let item = match line_type {
      LineType::Product => MissingReference::Product,
      LineType::Service => MissingReference::Service,
    };
    first_missing(&[
      (MissingReference::Time, self.sk_time),
      (MissingReference::Customer, self.sk_customer),
      (MissingReference::Site, self.sk_site),
      (item, self.sk_item),
    ])
  }

  fn measures(&self, line_type: LineType) -> SaleLineMeasures {
    match line_type {
      LineType::Product => SaleLineMeasures::product(
        self.quantity,
        self.unit_price,
        self.unit_cost,
        self.subtotal,
        self.discount,
      ),
      LineType::Service => {
        SaleLineMeasures::service(self.quantity, self.unit_price, self.unit_cost, self.subtotal)
      }
    }
  }
}

pub fn load_sales(conn: &Connection, ctx: &LoadContext) -> Result<SalesLoad> {
  let mut rejections = Vec::new();
  let products = load_sale_lines(conn, LineType::Product, &mut rejections)?;
  let services = load_sale_lines(conn, LineType::Service, &mut rejections)?;

  if ctx.record_rejections {
    replace_rejections(conn, FactKind::Sale, &rejections, ctx.today)?;
  }
  Ok(SalesLoad { products, services })
}

fn load_sale_lines(
  conn:       &Connection,
  line_type:  LineType,
  rejections: &mut Vec<Rejection>,
) -> Result<FactLoad> {
  let query = match line_type {
    LineType::Product => PRODUCT_LINE_CANDIDATES,
    LineType::Service => SERVICE_LINE_CANDIDATES,
  };

  let candidates: Vec<SaleLineCandidate> = {
    let mut stmt = conn.prepare(query)?;
    stmt
      .query_map(params![line_type.as_str()], |row| {
        Ok(SaleLineCandidate {
          sale_id:      row.get(0)?,
          line_number:  row.get(1)?,
          payment_type: row.get(2)?,
          status:       row.get(3)?,
          quantity:     row.get(4)?,
          unit_price:   row.get(5)?,
          unit_cost:    row.get(6)?,
          subtotal:     row.get(7)?,
          discount:     row.get(8)?,
          sk_time:      row.get(9)?,
          sk_customer:  row.get(10)?,
          sk_site:      row.get(11)?,
          sk_item:      row.get(12)?,
        })
      })?
      .collect::<rusqlite::Result<_>>()?
  };

  let mut load = FactLoad::default();
  let mut insert = conn.prepare(INSERT_SALE_LINE)?;

  for c in &candidates {
    if let Some(missing) = c.missing(line_type) {
      load.reject(missing);
      rejections.push(Rejection {
        fact: FactKind::Sale,
        source_id: c.sale_id,
        line: Some(SaleLineRef { line_number: c.line_number, line_type }),
        missing,
      });
      continue;
    }

    let (sk_product, sk_service) = match line_type {
      LineType::Product => (c.sk_item, None),
      LineType::Service => (None, c.sk_item),
    };
    let m = c.measures(line_type);
    insert.execute(params![
      c.sk_time,
      c.sk_customer,
      c.sk_site,
      sk_product,
      sk_service,
      c.sale_id,
      c.line_number,
      line_type.as_str(),
      c.payment_type,
      c.status,
      m.quantity,
      m.unit_price,
      m.unit_cost,
      m.subtotal,
      m.discount,
      m.total,
      m.margin_unit,
      m.margin_total,
    ])?;
    load.inserted += 1;
  }

  Ok(load)
}

// ─── Rejections ──────────────────────────────────────────────────────────────

/// Replace the stored orphan snapshot for `fact` with `rejections`.
fn replace_rejections(
  conn:       &Connection,
  fact:       FactKind,
  rejections: &[Rejection],
  today:      NaiveDate,
) -> Result<()> {
  conn.execute("DELETE FROM dw.etl_rejection WHERE fact_type = ?1", params![fact.as_str()])?;

  let detected_on = encode_date(today);
  let mut stmt = conn.prepare(
    "INSERT INTO dw.etl_rejection (fact_type, source_id, line_number, line_type, missing, detected_on)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
  )?;
  for r in rejections {
    stmt.execute(params![
      r.fact.as_str(),
      r.source_id,
      r.line.map(|l| l.line_number),
      r.line.map(|l| l.line_type.as_str()),
      r.missing.as_str(),
      detected_on,
    ])?;
  }
  Ok(())
}
