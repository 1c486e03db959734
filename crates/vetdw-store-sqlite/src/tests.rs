//! Integration tests for `SqliteWarehouse` against in-memory databases.

use chrono::NaiveDate;
use rusqlite::params;
use vetdw_core::{
  dimension::{Dimension, DimensionLoad, HistoryMode, validate_history},
  fact::{FactKind, FactLoad, LineType, MissingReference, SalesLoad},
  store::{LoadContext, LoadSession, Warehouse},
};

use crate::{Error, SqliteWarehouse, schema::SOURCE_SCHEMA};

fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

/// An empty source and warehouse with 2024 seeded into the time dimension.
fn warehouse() -> SqliteWarehouse {
  let mut w = SqliteWarehouse::open_in_memory().expect("in-memory warehouse");
  w.connection().execute_batch(SOURCE_SCHEMA).unwrap();
  w.seed_time_dimension(d(2024, 1, 1), d(2024, 12, 31)).unwrap();
  w
}

/// One customer with one pet, one vet at one site, one product and one
/// service, two appointments and one sale with a line of each type.
fn seeded() -> SqliteWarehouse {
  let w = warehouse();
  w.connection()
    .execute_batch(
      "INSERT INTO customer VALUES
         (1, 'Ana', 'Torres', '12345678', '999111222', 'ana@example.pe',
          'Av. Arequipa 123, Lima', '2020-05-01', 'Activo');
       INSERT INTO pet VALUES
         (10, 'Firulais', 'Perro', 'Labrador', 'M', 'Negro', 30.0, '2020-01-01', 'Activo', 1);
       INSERT INTO site VALUES
         (1000, 'Sede Central', 'Av. Javier Prado 1', 'Lima', '01-555', 'Activo');
       INSERT INTO veterinarian VALUES
         (100, 'Luis', 'Rojas', '87654321', 'CMVP-1', 'Medicina General',
          '999', 'luis@example.pe', '2015-01-01', 1000, 'Activo');
       INSERT INTO supplier VALUES (1, 'Proveedor SA');
       INSERT INTO product VALUES
         (500, 'Alimento', 'Bolsa 15kg', 'Alimento', 'Nutrición', 'unidad', 100.0, 60.0, 1, 'Activo');
       INSERT INTO service VALUES
         (600, 'Consulta', 'Consulta general', 'Consulta', 30, 80.0, 30.0, 'Activo');
       INSERT INTO appointment VALUES
         (1, '2024-03-01', '10:00', 'Control anual', 'Completada', 30, 80.0, 10, 100, 1000),
         (2, '2024-03-10', '11:00', 'EMERGENCIA por fractura', 'Cancelada', 45, 150.0, 10, 100, 1000);
       INSERT INTO sale VALUES (1, '2024-03-01 10:45:00', 380.0, 'Efectivo', 'Pagada', 1, 1000);
       INSERT INTO sale_product_line VALUES (1, 1, 500, 3, 100.0, 300.0, 0.0);
       INSERT INTO sale_service_line VALUES (1, 1, 600, 1, 80.0, 80.0);",
    )
    .unwrap();
  w
}

struct Loaded {
  dimensions:   Vec<DimensionLoad>,
  appointments: FactLoad,
  sales:        SalesLoad,
}

fn load(w: &mut SqliteWarehouse, ctx: &LoadContext) -> Loaded {
  let mut session = w.begin().unwrap();
  let dimensions = Dimension::ALL
    .iter()
    .map(|&dim| vetdw_core::dimension::historize(&mut session, dim, ctx).unwrap())
    .collect();
  let appointments = session.load_appointments(ctx).unwrap();
  let sales = session.load_sales(ctx).unwrap();
  session.commit().unwrap();
  Loaded { dimensions, appointments, sales }
}

fn count(w: &SqliteWarehouse, sql: &str) -> i64 {
  w.connection().query_row(sql, [], |r| r.get(0)).unwrap()
}

// ─── Setup ───────────────────────────────────────────────────────────────────

#[test]
fn missing_source_table_is_reported() {
  let w = SqliteWarehouse::open_in_memory().unwrap();
  let err = w.verify_source().unwrap_err();
  assert!(matches!(err, Error::MissingSourceTable("customer")));
}

#[test]
fn provisioned_source_verifies() {
  warehouse().verify_source().unwrap();
}

#[test]
fn time_seeding_is_idempotent() {
  let mut w = warehouse();
  assert_eq!(count(&w, "SELECT COUNT(*) FROM dw.dim_time"), 366);
  assert_eq!(w.seed_time_dimension(d(2024, 12, 30), d(2025, 1, 2)).unwrap(), 2);

  let (weekday, weekend, quarter): (i64, bool, i64) = w
    .connection()
    .query_row(
      "SELECT weekday, is_weekend, quarter FROM dw.dim_time WHERE sk_time = 20240309",
      [],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .unwrap();
  assert_eq!((weekday, weekend, quarter), (6, true, 1));
}

#[test]
fn reversed_time_range_is_rejected() {
  let mut w = warehouse();
  let err = w.seed_time_dimension(d(2024, 2, 1), d(2024, 1, 1)).unwrap_err();
  assert!(matches!(err, Error::InvalidDateRange { .. }));
}

// ─── Dimensions ──────────────────────────────────────────────────────────────

#[test]
fn derived_attributes_are_stored() {
  let mut w = seeded();
  load(&mut w, &LoadContext::new(d(2024, 6, 1)));

  let (city, segment, tenure): (String, String, i64) = w
    .connection()
    .query_row(
      "SELECT city, segment, tenure_years FROM dw.dim_customer WHERE customer_id = 1",
      [],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .unwrap();
  assert_eq!((city.as_str(), segment.as_str(), tenure), ("Lima", "VIP", 4));

  let (age_group, size, breed): (String, String, String) = w
    .connection()
    .query_row(
      "SELECT age_group, size, breed_category FROM dw.dim_pet WHERE pet_id = 10",
      [],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .unwrap();
  assert_eq!((age_group.as_str(), size.as_str(), breed.as_str()), ("Adulto", "Grande", "Pura Raza"));

  let (region, zone, site_type): (String, String, String) = w
    .connection()
    .query_row(
      "SELECT region, zone, site_type FROM dw.dim_site WHERE site_id = 1000",
      [],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .unwrap();
  assert_eq!(
    (region.as_str(), zone.as_str(), site_type.as_str()),
    ("Lima Metropolitana", "Centro", "Central")
  );

  let (supplier, margin): (String, f64) = w
    .connection()
    .query_row(
      "SELECT supplier_name, current_margin FROM dw.dim_product WHERE product_id = 500",
      [],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .unwrap();
  assert_eq!((supplier.as_str(), margin), ("Proveedor SA", 40.0));
}

#[test]
fn second_run_is_a_noop() {
  let mut w = seeded();
  let ctx = LoadContext::new(d(2024, 6, 1));
  let first = load(&mut w, &ctx);
  assert!(first.dimensions.iter().all(|l| l.inserted == 1));
  let before = w.table_counts().unwrap();

  let second = load(&mut w, &ctx);
  assert!(second.dimensions.iter().all(DimensionLoad::is_noop));
  assert_eq!(second.appointments.inserted, 0);
  assert_eq!(second.sales.inserted(), 0);
  assert_eq!(w.table_counts().unwrap(), before);
}

#[test]
fn removed_key_is_expired_and_reinstated() {
  let mut w = seeded();
  load(&mut w, &LoadContext::new(d(2024, 6, 1)));

  // Facts already loaded stay put; only the dimension history is under test.
  let ctx = LoadContext::new(d(2024, 6, 10));
  w.connection().execute("DELETE FROM service WHERE service_id = 600", []).unwrap();
  let removed = load(&mut w, &ctx);
  let service = removed.dimensions.iter().find(|l| l.dimension == Dimension::Service).unwrap();
  assert_eq!((service.expired, service.inserted), (1, 0));
  assert_eq!(count(&w, "SELECT COUNT(*) FROM dw.dim_service WHERE is_current = 1"), 0);

  w.connection()
    .execute(
      "INSERT INTO service VALUES (600, 'Consulta', 'Consulta general', 'Consulta', 30, 90.0, 30.0, 'Activo')",
      [],
    )
    .unwrap();
  load(&mut w, &ctx);

  let history = w.history(Dimension::Service, 600).unwrap();
  assert_eq!(history.len(), 2);
  validate_history(&history).unwrap();
  assert_eq!(history[0].valid_to, Some(d(2024, 6, 9)));
  assert_eq!(history[1].valid_from, d(2024, 6, 10));
  assert!(history[1].is_current);
  assert_eq!(history[1].version, 1);
}

#[test]
fn deletion_aware_mode_ignores_attribute_changes() {
  let mut w = seeded();
  load(&mut w, &LoadContext::new(d(2024, 6, 1)));

  w.connection().execute("UPDATE site SET phone = '01-777' WHERE site_id = 1000", []).unwrap();
  load(&mut w, &LoadContext::new(d(2024, 6, 2)));

  assert_eq!(w.history(Dimension::Site, 1000).unwrap().len(), 1);
}

#[test]
fn versioned_mode_closes_changed_rows() {
  let mut w = seeded();
  let mut ctx = LoadContext::new(d(2024, 6, 1));
  ctx.history = HistoryMode::Versioned;
  load(&mut w, &ctx);

  w.connection()
    .execute("UPDATE product SET price = 120.0 WHERE product_id = 500", [])
    .unwrap();
  ctx.today = d(2024, 7, 1);
  let loaded = load(&mut w, &ctx);
  let product = loaded.dimensions.iter().find(|l| l.dimension == Dimension::Product).unwrap();
  assert_eq!((product.expired, product.changed, product.inserted), (0, 1, 1));

  let history = w.history(Dimension::Product, 500).unwrap();
  validate_history(&history).unwrap();
  assert_eq!(history.iter().map(|v| v.version).collect::<Vec<_>>(), vec![1, 2]);
  assert_eq!(history[0].valid_to, Some(d(2024, 6, 30)));

  let margin: f64 = w
    .connection()
    .query_row(
      "SELECT current_margin FROM dw.dim_product WHERE product_id = 500 AND is_current = 1",
      [],
      |r| r.get(0),
    )
    .unwrap();
  assert_eq!(margin, 60.0);
}

// ─── Facts ───────────────────────────────────────────────────────────────────

#[test]
fn appointment_flags_are_derived() {
  let mut w = seeded();
  let loaded = load(&mut w, &LoadContext::new(d(2024, 6, 1)));
  assert_eq!(loaded.appointments.inserted, 2);

  let mut stmt = w
    .connection()
    .prepare(
      "SELECT is_first_visit, is_emergency, is_checkup, attended
       FROM dw.fact_appointment ORDER BY appointment_id",
    )
    .unwrap();
  let flags: Vec<(bool, bool, bool, bool)> = stmt
    .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
    .unwrap()
    .collect::<rusqlite::Result<_>>()
    .unwrap();
  assert_eq!(flags, vec![(true, false, true, true), (false, true, false, false)]);
}

#[test]
fn same_day_appointments_are_both_first_visits() {
  let mut w = seeded();
  w.connection()
    .execute(
      "INSERT INTO appointment VALUES (3, '2024-03-01', '16:00', 'Vacuna', 'Completada', 15, 40.0, 10, 100, 1000)",
      [],
    )
    .unwrap();
  load(&mut w, &LoadContext::new(d(2024, 6, 1)));

  assert_eq!(
    count(&w, "SELECT COUNT(*) FROM dw.fact_appointment WHERE is_first_visit = 1"),
    2
  );
}

#[test]
fn sale_line_margins() {
  let mut w = seeded();
  let loaded = load(&mut w, &LoadContext::new(d(2024, 6, 1)));
  assert_eq!((loaded.sales.products.inserted, loaded.sales.services.inserted), (1, 1));

  let (unit, total, sale_total, sk_time): (f64, f64, f64, i64) = w
    .connection()
    .query_row(
      "SELECT margin_unit, margin_total, total, sk_time FROM dw.fact_sale WHERE line_type = ?1",
      params![LineType::Product.as_str()],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
    )
    .unwrap();
  assert_eq!((unit, total, sale_total, sk_time), (40.0, 120.0, 300.0, 20240301));

  let (discount, margin_total, sk_product): (f64, f64, Option<i64>) = w
    .connection()
    .query_row(
      "SELECT discount, margin_total, sk_product FROM dw.fact_sale WHERE line_type = ?1",
      params![LineType::Service.as_str()],
      |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .unwrap();
  assert_eq!((discount, margin_total, sk_product), (0.0, 50.0, None));
}

#[test]
fn orphan_appointment_is_quarantined() {
  let mut w = seeded();
  w.connection()
    .execute(
      "INSERT INTO appointment VALUES (4, '2024-04-01', '09:00', 'Consulta', 'Completada', 30, 80.0, 99, 100, 1000)",
      [],
    )
    .unwrap();
  let ctx = LoadContext::new(d(2024, 6, 1));
  let loaded = load(&mut w, &ctx);

  assert_eq!(loaded.appointments.inserted, 2);
  assert_eq!(loaded.appointments.rejected.get(&MissingReference::Pet), Some(&1));
  assert_eq!(count(&w, "SELECT COUNT(*) FROM dw.fact_appointment WHERE appointment_id = 4"), 0);

  let rejections = w.rejections().unwrap();
  assert_eq!(rejections.len(), 1);
  assert_eq!(rejections[0].fact, FactKind::Appointment);
  assert_eq!(rejections[0].source_id, 4);
  assert_eq!(rejections[0].missing, MissingReference::Pet);

  // Once the pet exists the appointment loads and leaves the snapshot.
  w.connection()
    .execute(
      "INSERT INTO pet VALUES (99, 'Michi', 'Gato', 'Mestizo', 'H', 'Gris', 4.0, '2023-01-01', 'Activo', 1)",
      [],
    )
    .unwrap();
  let retried = load(&mut w, &ctx);
  assert_eq!(retried.appointments.inserted, 1);
  assert!(w.rejections().unwrap().is_empty());
}

#[test]
fn sale_outside_calendar_is_quarantined() {
  let mut w = seeded();
  w.connection()
    .execute_batch(
      "INSERT INTO sale VALUES (2, '2023-12-31', 80.0, 'Tarjeta', 'Pagada', 1, 1000);
       INSERT INTO sale_service_line VALUES (2, 2, 600, 1, 80.0, 80.0);",
    )
    .unwrap();
  let loaded = load(&mut w, &LoadContext::new(d(2024, 6, 1)));

  assert_eq!(loaded.sales.services.inserted, 1);
  assert_eq!(loaded.sales.services.rejected.get(&MissingReference::Time), Some(&1));

  let rejections = w.rejections().unwrap();
  assert_eq!(rejections.len(), 1);
  let line = rejections[0].line.unwrap();
  assert_eq!((line.line_number, line.line_type), (2, LineType::Service));
}

#[test]
fn rejections_are_not_recorded_when_disabled() {
  let mut w = seeded();
  w.connection()
    .execute(
      "INSERT INTO appointment VALUES (4, '2024-04-01', '09:00', 'Consulta', 'Completada', 30, 80.0, 99, 100, 1000)",
      [],
    )
    .unwrap();
  let mut ctx = LoadContext::new(d(2024, 6, 1));
  ctx.record_rejections = false;
  let loaded = load(&mut w, &ctx);

  assert_eq!(loaded.appointments.rejected_total(), 1);
  assert!(w.rejections().unwrap().is_empty());
}

#[test]
fn rolled_back_session_leaves_no_trace() {
  let mut w = seeded();
  let ctx = LoadContext::new(d(2024, 6, 1));
  {
    let mut session = w.begin().unwrap();
    vetdw_core::dimension::historize(&mut session, Dimension::Customer, &ctx).unwrap();
    session.rollback().unwrap();
  }
  assert_eq!(count(&w, "SELECT COUNT(*) FROM dw.dim_customer"), 0);
}
