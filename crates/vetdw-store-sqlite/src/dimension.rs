//! Set-based historization over the `dw.dim_*` tables.
//!
//! Each dimension is described by a [`DimensionTable`]: where its source rows
//! live, which warehouse columns it writes, and how a source row becomes a
//! warehouse row. The three steps below are shared by every dimension.

use chrono::NaiveDate;
use rusqlite::{Connection, Row, params, params_from_iter, types::Value};
use vetdw_core::{
  dimension::{Dimension, HistoryMode, Validity, expiry_date},
  source::{Customer, Pet, Product, Service, Site, Veterinarian},
  store::LoadContext,
};

use crate::{
  Result,
  encode::{date_value, encode_date, text},
};

// ─── Descriptors ─────────────────────────────────────────────────────────────

pub struct DimensionTable {
  pub table:        &'static str,
  pub surrogate:    &'static str,
  pub natural_key:  &'static str,
  pub source_table: &'static str,
  pub source_key:   &'static str,
  /// FROM clause; the source table is always aliased `src`.
  pub from:         &'static str,
  /// Source columns, read positionally by `build`.
  pub select:       &'static str,
  /// Warehouse columns produced by `build`, in order.
  pub columns:      &'static [&'static str],
  /// `(warehouse column, source expression)` pairs compared in versioned mode.
  pub tracked:      &'static [(&'static str, &'static str)],
  pub build:        fn(&Row<'_>, NaiveDate) -> rusqlite::Result<Vec<Value>>,
}

pub fn table(dimension: Dimension) -> &'static DimensionTable {
  match dimension {
    Dimension::Customer => &CUSTOMER,
    Dimension::Pet => &PET,
    Dimension::Veterinarian => &VETERINARIAN,
    Dimension::Site => &SITE,
    Dimension::Product => &PRODUCT,
    Dimension::Service => &SERVICE,
  }
}

static CUSTOMER: DimensionTable = DimensionTable {
  table:        "dim_customer",
  surrogate:    "sk_customer",
  natural_key:  "customer_id",
  source_table: "main.customer",
  source_key:   "customer_id",
  from:         "main.customer AS src",
  select:       "src.customer_id, src.first_name, src.last_name, src.dni, src.phone,
                 src.email, src.address, date(src.registration_date), src.status",
  columns:      &[
    "customer_id", "full_name", "first_name", "last_name", "dni", "phone", "email",
    "address", "city", "segment", "tenure_years", "status", "registration_date",
  ],
  tracked:      &[
    ("first_name", "src.first_name"),
    ("last_name", "src.last_name"),
    ("dni", "src.dni"),
    ("phone", "src.phone"),
    ("email", "src.email"),
    ("address", "src.address"),
    ("status", "src.status"),
    ("registration_date", "date(src.registration_date)"),
  ],
  build:        customer_row,
};

fn customer_row(row: &Row<'_>, today: NaiveDate) -> rusqlite::Result<Vec<Value>> {
  let c = Customer {
    customer_id:       row.get(0)?,
    first_name:        row.get(1)?,
    last_name:         row.get(2)?,
    dni:               row.get(3)?,
    phone:             row.get(4)?,
    email:             row.get(5)?,
    address:           row.get(6)?,
    registration_date: row.get(7)?,
    status:            row.get(8)?,
  };
  let attrs = c.derive(today);
  Ok(vec![
    c.customer_id.into(),
    attrs.full_name.into(),
    c.first_name.into(),
    c.last_name.into(),
    c.dni.into(),
    c.phone.into(),
    c.email.into(),
    c.address.into(),
    text(attrs.city.as_str()),
    text(attrs.segment.as_str()),
    attrs.tenure_years.into(),
    c.status.into(),
    date_value(c.registration_date),
  ])
}

static PET: DimensionTable = DimensionTable {
  table:        "dim_pet",
  surrogate:    "sk_pet",
  natural_key:  "pet_id",
  source_table: "main.pet",
  source_key:   "pet_id",
  from:         "main.pet AS src",
  select:       "src.pet_id, src.name, src.species, src.breed, src.sex, src.color,
                 src.weight_kg, date(src.birth_date), src.status, src.customer_id",
  columns:      &[
    "pet_id", "name", "species", "breed", "sex", "color", "weight_kg", "age_years",
    "age_group", "size", "breed_category", "status", "birth_date", "customer_id",
  ],
  tracked:      &[
    ("name", "src.name"),
    ("species", "src.species"),
    ("breed", "src.breed"),
    ("sex", "src.sex"),
    ("color", "src.color"),
    ("weight_kg", "src.weight_kg"),
    ("status", "src.status"),
    ("birth_date", "date(src.birth_date)"),
    ("customer_id", "src.customer_id"),
  ],
  build:        pet_row,
};

fn pet_row(row: &Row<'_>, today: NaiveDate) -> rusqlite::Result<Vec<Value>> {
  let p = Pet {
    pet_id:      row.get(0)?,
    name:        row.get(1)?,
    species:     row.get(2)?,
    breed:       row.get(3)?,
    sex:         row.get(4)?,
    color:       row.get(5)?,
    weight_kg:   row.get(6)?,
    birth_date:  row.get(7)?,
    status:      row.get(8)?,
    customer_id: row.get(9)?,
  };
  let attrs = p.derive(today);
  Ok(vec![
    p.pet_id.into(),
    p.name.into(),
    p.species.into(),
    p.breed.into(),
    p.sex.into(),
    p.color.into(),
    p.weight_kg.into(),
    attrs.age_years.into(),
    text(attrs.age_group.as_str()),
    text(attrs.size.as_str()),
    text(attrs.breed_category.as_str()),
    p.status.into(),
    date_value(p.birth_date),
    p.customer_id.into(),
  ])
}

static VETERINARIAN: DimensionTable = DimensionTable {
  table:        "dim_veterinarian",
  surrogate:    "sk_veterinarian",
  natural_key:  "veterinarian_id",
  source_table: "main.veterinarian",
  source_key:   "veterinarian_id",
  from:         "main.veterinarian AS src",
  select:       "src.veterinarian_id, src.first_name, src.last_name, src.dni,
                 src.license_number, src.specialty, src.phone, src.email,
                 date(src.hire_date), src.site_id, src.status",
  columns:      &[
    "veterinarian_id", "full_name", "first_name", "last_name", "dni", "license_number",
    "specialty", "specialty_category", "phone", "email", "hire_date", "years_experience",
    "site_id", "status",
  ],
  tracked:      &[
    ("first_name", "src.first_name"),
    ("last_name", "src.last_name"),
    ("dni", "src.dni"),
    ("license_number", "src.license_number"),
    ("specialty", "src.specialty"),
    ("phone", "src.phone"),
    ("email", "src.email"),
    ("hire_date", "date(src.hire_date)"),
    ("site_id", "src.site_id"),
    ("status", "src.status"),
  ],
  build:        veterinarian_row,
};

fn veterinarian_row(row: &Row<'_>, today: NaiveDate) -> rusqlite::Result<Vec<Value>> {
  let v = Veterinarian {
    veterinarian_id: row.get(0)?,
    first_name:      row.get(1)?,
    last_name:       row.get(2)?,
    dni:             row.get(3)?,
    license_number:  row.get(4)?,
    specialty:       row.get(5)?,
    phone:           row.get(6)?,
    email:           row.get(7)?,
    hire_date:       row.get(8)?,
    site_id:         row.get(9)?,
    status:          row.get(10)?,
  };
  let attrs = v.derive(today);
  Ok(vec![
    v.veterinarian_id.into(),
    attrs.full_name.into(),
    v.first_name.into(),
    v.last_name.into(),
    v.dni.into(),
    v.license_number.into(),
    v.specialty.into(),
    text(attrs.specialty_category.as_str()),
    v.phone.into(),
    v.email.into(),
    date_value(v.hire_date),
    attrs.years_experience.into(),
    v.site_id.into(),
    v.status.into(),
  ])
}

static SITE: DimensionTable = DimensionTable {
  table:        "dim_site",
  surrogate:    "sk_site",
  natural_key:  "site_id",
  source_table: "main.site",
  source_key:   "site_id",
  from:         "main.site AS src",
  select:       "src.site_id, src.name, src.address, src.city, src.phone, src.status",
  columns:      &[
    "site_id", "name", "address", "city", "region", "zone", "site_type", "phone", "status",
  ],
  tracked:      &[
    ("name", "src.name"),
    ("address", "src.address"),
    ("city", "src.city"),
    ("phone", "src.phone"),
    ("status", "src.status"),
  ],
  build:        site_row,
};

fn site_row(row: &Row<'_>, _today: NaiveDate) -> rusqlite::Result<Vec<Value>> {
  let s = Site {
    site_id: row.get(0)?,
    name:    row.get(1)?,
    address: row.get(2)?,
    city:    row.get(3)?,
    phone:   row.get(4)?,
    status:  row.get(5)?,
  };
  let attrs = s.derive();
  Ok(vec![
    s.site_id.into(),
    s.name.into(),
    s.address.into(),
    s.city.into(),
    text(attrs.region.as_str()),
    text(attrs.zone.as_str()),
    text(attrs.site_type.as_str()),
    s.phone.into(),
    s.status.into(),
  ])
}

static PRODUCT: DimensionTable = DimensionTable {
  table:        "dim_product",
  surrogate:    "sk_product",
  natural_key:  "product_id",
  source_table: "main.product",
  source_key:   "product_id",
  from:         "main.product AS src
                 LEFT JOIN main.supplier AS sup ON sup.supplier_id = src.supplier_id",
  select:       "src.product_id, src.name, src.description, src.kind, src.category,
                 src.unit, src.price, src.cost, src.supplier_id, sup.name, src.status",
  columns:      &[
    "product_id", "name", "description", "kind", "category", "unit", "current_price",
    "current_cost", "current_margin", "supplier_id", "supplier_name", "status",
  ],
  tracked:      &[
    ("name", "src.name"),
    ("description", "src.description"),
    ("kind", "src.kind"),
    ("category", "src.category"),
    ("unit", "src.unit"),
    ("current_price", "src.price"),
    ("current_cost", "src.cost"),
    ("supplier_id", "src.supplier_id"),
    ("status", "src.status"),
  ],
  build:        product_row,
};

fn product_row(row: &Row<'_>, _today: NaiveDate) -> rusqlite::Result<Vec<Value>> {
  let p = Product {
    product_id:    row.get(0)?,
    name:          row.get(1)?,
    description:   row.get(2)?,
    kind:          row.get(3)?,
    category:      row.get(4)?,
    unit:          row.get(5)?,
    price:         row.get(6)?,
    cost:          row.get(7)?,
    supplier_id:   row.get(8)?,
    supplier_name: row.get(9)?,
    status:        row.get(10)?,
  };
  let margin = p.margin();
  Ok(vec![
    p.product_id.into(),
    p.name.into(),
    p.description.into(),
    p.kind.into(),
    p.category.into(),
    p.unit.into(),
    p.price.into(),
    p.cost.into(),
    margin.into(),
    p.supplier_id.into(),
    p.supplier_name.into(),
    p.status.into(),
  ])
}

static SERVICE: DimensionTable = DimensionTable {
  table:        "dim_service",
  surrogate:    "sk_service",
  natural_key:  "service_id",
  source_table: "main.service",
  source_key:   "service_id",
  from:         "main.service AS src",
  select:       "src.service_id, src.name, src.description, src.category,
                 src.duration_minutes, src.price, src.cost, src.status",
  columns:      &[
    "service_id", "name", "description", "category", "duration_minutes", "current_price",
    "current_cost", "current_margin", "status",
  ],
  tracked:      &[
    ("name", "src.name"),
    ("description", "src.description"),
    ("category", "src.category"),
    ("duration_minutes", "src.duration_minutes"),
    ("current_price", "src.price"),
    ("current_cost", "src.cost"),
    ("status", "src.status"),
  ],
  build:        service_row,
};

fn service_row(row: &Row<'_>, _today: NaiveDate) -> rusqlite::Result<Vec<Value>> {
  let s = Service {
    service_id:       row.get(0)?,
    name:             row.get(1)?,
    description:      row.get(2)?,
    category:         row.get(3)?,
    duration_minutes: row.get(4)?,
    price:            row.get(5)?,
    cost:             row.get(6)?,
    status:           row.get(7)?,
  };
  let margin = s.margin();
  Ok(vec![
    s.service_id.into(),
    s.name.into(),
    s.description.into(),
    s.category.into(),
    s.duration_minutes.into(),
    s.price.into(),
    s.cost.into(),
    margin.into(),
    s.status.into(),
  ])
}

// ─── Steps ───────────────────────────────────────────────────────────────────

/// Close current rows whose natural key is gone from the source.
pub fn expire_missing(conn: &Connection, dim: &DimensionTable, today: NaiveDate) -> Result<usize> {
  let sql = format!(
    "UPDATE dw.{table} AS d
     SET valid_to = ?1, is_current = 0
     WHERE d.is_current = 1
       AND NOT EXISTS (
         SELECT 1 FROM {source} AS src WHERE src.{key} = d.{nk}
       )",
    table = dim.table,
    source = dim.source_table,
    key = dim.source_key,
    nk = dim.natural_key,
  );
  Ok(conn.execute(&sql, params![encode_date(expiry_date(today))])?)
}

/// Close current rows whose tracked attributes no longer match the source.
pub fn expire_changed(conn: &Connection, dim: &DimensionTable, today: NaiveDate) -> Result<usize> {
  let changed = dim
    .tracked
    .iter()
    .map(|(column, expr)| format!("{expr} IS NOT d.{column}"))
    .collect::<Vec<_>>()
    .join(" OR ");

  let sql = format!(
    "UPDATE dw.{table} AS d
     SET valid_to = ?1, is_current = 0
     WHERE d.is_current = 1
       AND EXISTS (
         SELECT 1 FROM {source} AS src
         WHERE src.{key} = d.{nk} AND ({changed})
       )",
    table = dim.table,
    source = dim.source_table,
    key = dim.source_key,
    nk = dim.natural_key,
  );
  Ok(conn.execute(&sql, params![encode_date(expiry_date(today))])?)
}

/// Insert a current row for every source key without one.
pub fn insert_new(conn: &Connection, dim: &DimensionTable, ctx: &LoadContext) -> Result<usize> {
  let select = format!(
    "SELECT {select},
            (SELECT MAX(h.version) FROM dw.{table} AS h WHERE h.{nk} = src.{key}) AS prior_version
     FROM {from}
     WHERE NOT EXISTS (
       SELECT 1 FROM dw.{table} AS d WHERE d.{nk} = src.{key} AND d.is_current = 1
     )
     ORDER BY src.{key}",
    select = dim.select,
    table = dim.table,
    nk = dim.natural_key,
    key = dim.source_key,
    from = dim.from,
  );

  // Collect before writing so the scan never observes its own inserts.
  let today = ctx.today;
  let pending: Vec<(Vec<Value>, Option<i64>)> = {
    let mut stmt = conn.prepare(&select)?;
    stmt
      .query_map([], |row| Ok(((dim.build)(row, today)?, row.get("prior_version")?)))?
      .collect::<rusqlite::Result<_>>()?
  };

  if pending.is_empty() {
    return Ok(0);
  }

  let width = dim.columns.len();
  let placeholders = (1..=width + 2)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");
  let insert = format!(
    "INSERT INTO dw.{table} ({columns}, valid_from, version, valid_to, is_current)
     VALUES ({placeholders}, NULL, 1)",
    table = dim.table,
    columns = dim.columns.join(", "),
  );

  let count = pending.len();
  let mut stmt = conn.prepare(&insert)?;
  let valid_from = encode_date(today);
  for (mut values, prior_version) in pending {
    let version = match ctx.history {
      HistoryMode::DeletionAware => 1,
      HistoryMode::Versioned => prior_version.unwrap_or(0) + 1,
    };
    values.push(Value::Text(valid_from.clone()));
    values.push(Value::Integer(version));
    stmt.execute(params_from_iter(values))?;
  }

  tracing::debug!(table = dim.table, rows = count, "inserted dimension rows");
  Ok(count)
}

/// Every row ever recorded for one natural key, oldest first.
pub fn history(conn: &Connection, dim: &DimensionTable, natural_key: i64) -> Result<Vec<Validity>> {
  let sql = format!(
    "SELECT {sk}, valid_from, valid_to, version, is_current
     FROM dw.{table}
     WHERE {nk} = ?1
     ORDER BY valid_from, {sk}",
    sk = dim.surrogate,
    table = dim.table,
    nk = dim.natural_key,
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params![natural_key], |row| {
      Ok(Validity {
        surrogate_key: row.get(0)?,
        valid_from:    row.get(1)?,
        valid_to:      row.get(2)?,
        version:       row.get(3)?,
        is_current:    row.get(4)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}
