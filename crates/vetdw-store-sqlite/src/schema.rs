//! SQL layouts for both sides of the loader.
//!
//! [`WAREHOUSE_SCHEMA`] is executed at connection startup against the `dw`
//! attachment and is idempotent thanks to `IF NOT EXISTS`. [`SOURCE_SCHEMA`]
//! documents the operational tables the loader reads; the loader never runs
//! it, but provisioning scripts and tests do.

/// Warehouse DDL; every object lives in the attached `dw` schema.
pub const WAREHOUSE_SCHEMA: &str = "
PRAGMA dw.journal_mode = WAL;

-- Pre-populated calendar; surrogate key is YYYYMMDD.
CREATE TABLE IF NOT EXISTS dw.dim_time (
    sk_time     INTEGER PRIMARY KEY,
    date        TEXT    NOT NULL UNIQUE,
    year        INTEGER NOT NULL,
    quarter     INTEGER NOT NULL,
    month       INTEGER NOT NULL,
    day         INTEGER NOT NULL,
    weekday     INTEGER NOT NULL,   -- 1 = Monday
    is_weekend  INTEGER NOT NULL
);

-- Historized dimensions. A natural key has at most one row with
-- is_current = 1; the partial unique indexes below enforce it.
CREATE TABLE IF NOT EXISTS dw.dim_customer (
    sk_customer       INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id       INTEGER NOT NULL,
    full_name         TEXT,
    first_name        TEXT,
    last_name         TEXT,
    dni               TEXT,
    phone             TEXT,
    email             TEXT,
    address           TEXT,
    city              TEXT    NOT NULL,
    segment           TEXT    NOT NULL,
    tenure_years      INTEGER,
    status            TEXT,
    registration_date TEXT,
    valid_from        TEXT    NOT NULL,
    valid_to          TEXT,
    version           INTEGER NOT NULL CHECK (version >= 1),
    is_current        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dw.dim_pet (
    sk_pet         INTEGER PRIMARY KEY AUTOINCREMENT,
    pet_id         INTEGER NOT NULL,
    name           TEXT,
    species        TEXT,
    breed          TEXT,
    sex            TEXT,
    color          TEXT,
    weight_kg      REAL,
    age_years      INTEGER,
    age_group      TEXT    NOT NULL,
    size           TEXT    NOT NULL,
    breed_category TEXT    NOT NULL,
    status         TEXT,
    birth_date     TEXT,
    customer_id    INTEGER,
    valid_from     TEXT    NOT NULL,
    valid_to       TEXT,
    version        INTEGER NOT NULL CHECK (version >= 1),
    is_current     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dw.dim_veterinarian (
    sk_veterinarian    INTEGER PRIMARY KEY AUTOINCREMENT,
    veterinarian_id    INTEGER NOT NULL,
    full_name          TEXT,
    first_name         TEXT,
    last_name          TEXT,
    dni                TEXT,
    license_number     TEXT,
    specialty          TEXT,
    specialty_category TEXT    NOT NULL,
    phone              TEXT,
    email              TEXT,
    hire_date          TEXT,
    years_experience   INTEGER,
    site_id            INTEGER,
    status             TEXT,
    valid_from         TEXT    NOT NULL,
    valid_to           TEXT,
    version            INTEGER NOT NULL CHECK (version >= 1),
    is_current         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dw.dim_site (
    sk_site    INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id    INTEGER NOT NULL,
    name       TEXT,
    address    TEXT,
    city       TEXT,
    region     TEXT    NOT NULL,
    zone       TEXT    NOT NULL,
    site_type  TEXT    NOT NULL,
    phone      TEXT,
    status     TEXT,
    valid_from TEXT    NOT NULL,
    valid_to   TEXT,
    version    INTEGER NOT NULL CHECK (version >= 1),
    is_current INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dw.dim_product (
    sk_product     INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id     INTEGER NOT NULL,
    name           TEXT,
    description    TEXT,
    kind           TEXT,
    category       TEXT,
    unit           TEXT,
    current_price  REAL,
    current_cost   REAL,
    current_margin REAL    NOT NULL,
    supplier_id    INTEGER,
    supplier_name  TEXT,
    status         TEXT,
    valid_from     TEXT    NOT NULL,
    valid_to       TEXT,
    version        INTEGER NOT NULL CHECK (version >= 1),
    is_current     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dw.dim_service (
    sk_service       INTEGER PRIMARY KEY AUTOINCREMENT,
    service_id       INTEGER NOT NULL,
    name             TEXT,
    description      TEXT,
    category         TEXT,
    duration_minutes INTEGER,
    current_price    REAL,
    current_cost     REAL,
    current_margin   REAL    NOT NULL,
    status           TEXT,
    valid_from       TEXT    NOT NULL,
    valid_to         TEXT,
    version          INTEGER NOT NULL CHECK (version >= 1),
    is_current       INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS dw.dim_customer_current_idx
    ON dim_customer(customer_id) WHERE is_current = 1;
CREATE UNIQUE INDEX IF NOT EXISTS dw.dim_pet_current_idx
    ON dim_pet(pet_id) WHERE is_current = 1;
CREATE UNIQUE INDEX IF NOT EXISTS dw.dim_veterinarian_current_idx
    ON dim_veterinarian(veterinarian_id) WHERE is_current = 1;
CREATE UNIQUE INDEX IF NOT EXISTS dw.dim_site_current_idx
    ON dim_site(site_id) WHERE is_current = 1;
CREATE UNIQUE INDEX IF NOT EXISTS dw.dim_product_current_idx
    ON dim_product(product_id) WHERE is_current = 1;
CREATE UNIQUE INDEX IF NOT EXISTS dw.dim_service_current_idx
    ON dim_service(service_id) WHERE is_current = 1;

-- Facts are append-only. No UPDATE or DELETE is ever issued against them.
CREATE TABLE IF NOT EXISTS dw.fact_appointment (
    sk_appointment   INTEGER PRIMARY KEY AUTOINCREMENT,
    sk_time          INTEGER NOT NULL,
    sk_customer      INTEGER NOT NULL,
    sk_pet           INTEGER NOT NULL,
    sk_veterinarian  INTEGER NOT NULL,
    sk_site          INTEGER NOT NULL,
    appointment_id   INTEGER NOT NULL UNIQUE,
    time             TEXT,
    reason           TEXT,
    status           TEXT,
    duration_minutes INTEGER,
    cost             REAL,
    is_first_visit   INTEGER NOT NULL,
    is_emergency     INTEGER NOT NULL,
    is_checkup       INTEGER NOT NULL,
    attended         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dw.fact_sale (
    sk_sale      INTEGER PRIMARY KEY AUTOINCREMENT,
    sk_time      INTEGER NOT NULL,
    sk_customer  INTEGER NOT NULL,
    sk_site      INTEGER NOT NULL,
    sk_product   INTEGER,
    sk_service   INTEGER,
    sale_id      INTEGER NOT NULL,
    line_number  INTEGER NOT NULL,
    line_type    TEXT    NOT NULL,   -- 'Producto' | 'Servicio'
    payment_type TEXT,
    status       TEXT,
    quantity     INTEGER NOT NULL,
    unit_price   REAL    NOT NULL,
    unit_cost    REAL    NOT NULL,
    subtotal     REAL    NOT NULL,
    discount     REAL    NOT NULL,
    total        REAL    NOT NULL,
    margin_unit  REAL    NOT NULL,
    margin_total REAL    NOT NULL,
    UNIQUE (sale_id, line_number, line_type),
    CHECK (
        (line_type = 'Producto' AND sk_product IS NOT NULL AND sk_service IS NULL)
     OR (line_type = 'Servicio' AND sk_service IS NOT NULL AND sk_product IS NULL)
    )
);

-- Source rows currently excluded from a fact table; replaced per fact type
-- on every load.
CREATE TABLE IF NOT EXISTS dw.etl_rejection (
    fact_type   TEXT    NOT NULL,   -- 'appointment' | 'sale'
    source_id   INTEGER NOT NULL,
    line_number INTEGER,
    line_type   TEXT,
    missing     TEXT    NOT NULL,   -- first unresolved reference
    detected_on TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS dw.fact_appointment_time_idx ON fact_appointment(sk_time);
CREATE INDEX IF NOT EXISTS dw.fact_sale_time_idx        ON fact_sale(sk_time);
CREATE INDEX IF NOT EXISTS dw.etl_rejection_fact_idx    ON etl_rejection(fact_type);

PRAGMA dw.user_version = 1;
";

/// Operational tables, in the layout the loader's queries expect.
pub const SOURCE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS customer (
    customer_id       INTEGER PRIMARY KEY,
    first_name        TEXT,
    last_name         TEXT,
    dni               TEXT,
    phone             TEXT,
    email             TEXT,
    address           TEXT,
    registration_date TEXT,
    status            TEXT
);

CREATE TABLE IF NOT EXISTS pet (
    pet_id      INTEGER PRIMARY KEY,
    name        TEXT,
    species     TEXT,
    breed       TEXT,
    sex         TEXT,
    color       TEXT,
    weight_kg   REAL,
    birth_date  TEXT,
    status      TEXT,
    customer_id INTEGER
);

CREATE TABLE IF NOT EXISTS veterinarian (
    veterinarian_id INTEGER PRIMARY KEY,
    first_name      TEXT,
    last_name       TEXT,
    dni             TEXT,
    license_number  TEXT,
    specialty       TEXT,
    phone           TEXT,
    email           TEXT,
    hire_date       TEXT,
    site_id         INTEGER,
    status          TEXT
);

CREATE TABLE IF NOT EXISTS site (
    site_id INTEGER PRIMARY KEY,
    name    TEXT,
    address TEXT,
    city    TEXT,
    phone   TEXT,
    status  TEXT
);

CREATE TABLE IF NOT EXISTS supplier (
    supplier_id INTEGER PRIMARY KEY,
    name        TEXT
);

CREATE TABLE IF NOT EXISTS product (
    product_id  INTEGER PRIMARY KEY,
    name        TEXT,
    description TEXT,
    kind        TEXT,
    category    TEXT,
    unit        TEXT,
    price       REAL,
    cost        REAL,
    supplier_id INTEGER,
    status      TEXT
);

CREATE TABLE IF NOT EXISTS service (
    service_id       INTEGER PRIMARY KEY,
    name             TEXT,
    description      TEXT,
    category         TEXT,
    duration_minutes INTEGER,
    price            REAL,
    cost             REAL,
    status           TEXT
);

CREATE TABLE IF NOT EXISTS appointment (
    appointment_id   INTEGER PRIMARY KEY,
    date             TEXT NOT NULL,
    time             TEXT,
    reason           TEXT,
    status           TEXT,
    duration_minutes INTEGER,
    cost             REAL,
    pet_id           INTEGER,
    veterinarian_id  INTEGER,
    site_id          INTEGER
);

CREATE TABLE IF NOT EXISTS sale (
    sale_id      INTEGER PRIMARY KEY,
    sale_date    TEXT NOT NULL,
    total        REAL,
    payment_type TEXT,
    status       TEXT,
    customer_id  INTEGER,
    site_id      INTEGER
);

CREATE TABLE IF NOT EXISTS sale_product_line (
    line_id    INTEGER PRIMARY KEY,
    sale_id    INTEGER NOT NULL,
    product_id INTEGER,
    quantity   INTEGER NOT NULL,
    unit_price REAL    NOT NULL,
    subtotal   REAL    NOT NULL,
    discount   REAL
);

CREATE TABLE IF NOT EXISTS sale_service_line (
    line_id    INTEGER PRIMARY KEY,
    sale_id    INTEGER NOT NULL,
    service_id INTEGER,
    quantity   INTEGER NOT NULL,
    unit_price REAL    NOT NULL,
    subtotal   REAL    NOT NULL
);
";

/// Operational tables that must exist before a run starts.
pub const REQUIRED_SOURCE_TABLES: &[&str] = &[
  "customer",
  "pet",
  "veterinarian",
  "site",
  "supplier",
  "product",
  "service",
  "appointment",
  "sale",
  "sale_product_line",
  "sale_service_line",
];

/// Warehouse tables reported in the run summary.
pub const WAREHOUSE_TABLES: &[&str] = &[
  "dim_time",
  "dim_customer",
  "dim_pet",
  "dim_veterinarian",
  "dim_site",
  "dim_product",
  "dim_service",
  "fact_appointment",
  "fact_sale",
  "etl_rejection",
];
