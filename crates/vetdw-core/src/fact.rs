//! Fact vocabulary: per-row measures and flags, and the bookkeeping for source
//! rows that could not be linked to current dimension rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, classify::round_cents};

// ─── Fact identity ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
  Appointment,
  Sale,
}

impl FactKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Appointment => "appointment",
      Self::Sale => "sale",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "appointment" => Ok(Self::Appointment),
      "sale" => Ok(Self::Sale),
      other => Err(Error::UnknownLabel { kind: "fact kind", value: other.to_owned() }),
    }
  }

  pub fn table(self) -> &'static str {
    match self {
      Self::Appointment => "fact_appointment",
      Self::Sale => "fact_sale",
    }
  }
}

/// Discriminator of a sale fact row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
  Product,
  Service,
}

impl LineType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Product => "Producto",
      Self::Service => "Servicio",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "Producto" => Ok(Self::Product),
      "Servicio" => Ok(Self::Service),
      other => Err(Error::UnknownLabel { kind: "line type", value: other.to_owned() }),
    }
  }
}

// ─── Appointment rules ───────────────────────────────────────────────────────

/// Sentinels and keyword sets used to flag appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactRules {
  /// Status value meaning the patient attended.
  pub completed_status:   String,
  /// Lower-cased substrings of the motive marking an emergency.
  pub emergency_keywords: Vec<String>,
  /// Lower-cased substrings of the motive marking a check-up.
  pub checkup_keywords:   Vec<String>,
}

impl Default for FactRules {
  fn default() -> Self {
    Self {
      completed_status:   "Completada".into(),
      emergency_keywords: vec!["emergencia".into()],
      checkup_keywords:   vec!["control".into()],
    }
  }
}

/// Case-insensitive substring match against any keyword.
pub fn matches_any(text: Option<&str>, keywords: &[String]) -> bool {
  let Some(text) = text else { return false };
  let text = text.to_lowercase();
  keywords
    .iter()
    .any(|k| text.contains(k.to_lowercase().as_str()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AppointmentFlags {
  pub is_first_visit: bool,
  pub is_emergency:   bool,
  pub is_checkup:     bool,
  pub attended:       bool,
}

impl AppointmentFlags {
  /// `has_earlier_visit` is whether the same pet has an appointment on a
  /// strictly earlier date; same-day appointments do not count.
  pub fn evaluate(
    reason:            Option<&str>,
    status:            Option<&str>,
    has_earlier_visit: bool,
    rules:             &FactRules,
  ) -> Self {
    Self {
      is_first_visit: !has_earlier_visit,
      is_emergency:   matches_any(reason, &rules.emergency_keywords),
      is_checkup:     matches_any(reason, &rules.checkup_keywords),
      attended:       status == Some(rules.completed_status.as_str()),
    }
  }
}

// ─── Sale measures ───────────────────────────────────────────────────────────

/// Monetary measures of one sale line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SaleLineMeasures {
  pub quantity:     i64,
  pub unit_price:   f64,
  pub unit_cost:    f64,
  pub subtotal:     f64,
  pub discount:     f64,
  pub total:        f64,
  pub margin_unit:  f64,
  pub margin_total: f64,
}

impl SaleLineMeasures {
  /// Product line; unknown cost and discount count as zero.
  pub fn product(
    quantity:   i64,
    unit_price: f64,
    unit_cost:  Option<f64>,
    subtotal:   f64,
    discount:   Option<f64>,
  ) -> Self {
    Self::compute(quantity, unit_price, unit_cost.unwrap_or(0.0), subtotal, discount.unwrap_or(0.0))
  }

  /// Service line; services are never discounted.
  pub fn service(quantity: i64, unit_price: f64, unit_cost: Option<f64>, subtotal: f64) -> Self {
    Self::compute(quantity, unit_price, unit_cost.unwrap_or(0.0), subtotal, 0.0)
  }

  fn compute(quantity: i64, unit_price: f64, unit_cost: f64, subtotal: f64, discount: f64) -> Self {
    let margin_unit = round_cents(unit_price - unit_cost);
    Self {
      quantity,
      unit_price,
      unit_cost,
      subtotal,
      discount,
      total: round_cents(subtotal - discount),
      margin_unit,
      margin_total: round_cents(margin_unit * quantity as f64),
    }
  }
}

// ─── Orphans ─────────────────────────────────────────────────────────────────

/// The first reference a source row failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReference {
  Time,
  Pet,
  Customer,
  Veterinarian,
  Site,
  Product,
  Service,
}

impl MissingReference {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Time => "time",
      Self::Pet => "pet",
      Self::Customer => "customer",
      Self::Veterinarian => "veterinarian",
      Self::Site => "site",
      Self::Product => "product",
      Self::Service => "service",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "time" => Ok(Self::Time),
      "pet" => Ok(Self::Pet),
      "customer" => Ok(Self::Customer),
      "veterinarian" => Ok(Self::Veterinarian),
      "site" => Ok(Self::Site),
      "product" => Ok(Self::Product),
      "service" => Ok(Self::Service),
      other => Err(Error::UnknownLabel { kind: "missing reference", value: other.to_owned() }),
    }
  }
}

/// Return the first unresolved reference, checking in the given order.
pub fn first_missing(refs: &[(MissingReference, Option<i64>)]) -> Option<MissingReference> {
  refs.iter().find(|(_, key)| key.is_none()).map(|(r, _)| *r)
}

/// Identifies one line of a multi-line sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRef {
  pub line_number: i64,
  pub line_type:   LineType,
}

/// A source row excluded from a fact table because a reference is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
  pub fact:      FactKind,
  pub source_id: i64,
  pub line:      Option<SaleLineRef>,
  pub missing:   MissingReference,
}

// ─── Load results ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactLoad {
  pub inserted: usize,
  /// Excluded source rows, keyed by the reference that was missing.
  pub rejected: BTreeMap<MissingReference, usize>,
}

impl FactLoad {
  pub fn reject(&mut self, missing: MissingReference) {
    *self.rejected.entry(missing).or_default() += 1;
  }

  pub fn rejected_total(&self) -> usize { self.rejected.values().sum() }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SalesLoad {
  pub products: FactLoad,
  pub services: FactLoad,
}

impl SalesLoad {
  pub fn inserted(&self) -> usize { self.products.inserted + self.services.inserted }

  pub fn rejected_total(&self) -> usize {
    self.products.rejected_total() + self.services.rejected_total()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn product_line_margins() {
    let m = SaleLineMeasures::product(3, 100.0, Some(60.0), 300.0, Some(0.0));
    assert_eq!(m.margin_unit, 40.0);
    assert_eq!(m.margin_total, 120.0);
    assert_eq!(m.total, 300.0);
  }

  #[test]
  fn product_line_discount_and_missing_cost() {
    let m = SaleLineMeasures::product(2, 12.5, None, 25.0, Some(5.0));
    assert_eq!(m.unit_cost, 0.0);
    assert_eq!(m.margin_unit, 12.5);
    assert_eq!(m.margin_total, 25.0);
    assert_eq!(m.total, 20.0);
  }

  #[test]
  fn service_line_has_no_discount() {
    let m = SaleLineMeasures::service(1, 80.0, Some(35.0), 80.0);
    assert_eq!(m.discount, 0.0);
    assert_eq!(m.total, 80.0);
    assert_eq!(m.margin_total, 45.0);
  }

  #[test]
  fn appointment_flags() {
    let rules = FactRules::default();
    let f = AppointmentFlags::evaluate(Some("EMERGENCIA nocturna"), Some("Completada"), false, &rules);
    assert!(f.is_first_visit);
    assert!(f.is_emergency);
    assert!(!f.is_checkup);
    assert!(f.attended);

    let f = AppointmentFlags::evaluate(Some("Control rutinario"), Some("Cancelada"), true, &rules);
    assert!(!f.is_first_visit);
    assert!(f.is_checkup);
    assert!(!f.attended);

    let f = AppointmentFlags::evaluate(None, None, false, &rules);
    assert!(!f.is_emergency && !f.is_checkup && !f.attended);
  }

  #[test]
  fn first_missing_respects_order() {
    use MissingReference::*;
    assert_eq!(first_missing(&[(Time, Some(1)), (Pet, None), (Site, None)]), Some(Pet));
    assert_eq!(first_missing(&[(Time, Some(1)), (Pet, Some(2))]), None);
  }

  #[test]
  fn fact_load_counts_rejections() {
    let mut load = FactLoad::default();
    load.reject(MissingReference::Pet);
    load.reject(MissingReference::Pet);
    load.reject(MissingReference::Time);
    assert_eq!(load.rejected_total(), 3);
    assert_eq!(load.rejected[&MissingReference::Pet], 2);
  }

  #[test]
  fn labels_parse_back() {
    assert_eq!(LineType::parse("Servicio").unwrap(), LineType::Service);
    assert_eq!(MissingReference::parse("veterinarian").unwrap(), MissingReference::Veterinarian);
    assert!(FactKind::parse("refund").is_err());
  }
}
