//! Derived-attribute rules applied when a dimension row is first inserted.
//!
//! Every rule is a total, pure function of source attributes and the run's
//! reference date. Missing inputs fall through to the rule's default branch,
//! so the same inputs always produce the same label.

use std::fmt;

use chrono::{Datelike, NaiveDate};

/// Species value identifying dogs in the operational data.
pub const DOG_SPECIES: &str = "Perro";

/// Specialty value identifying general practitioners.
pub const GENERAL_SPECIALTY: &str = "Medicina General";

macro_rules! label_display {
  ($($ty:ty),* $(,)?) => {
    $(
      impl fmt::Display for $ty {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
          f.write_str(self.as_str())
        }
      }
    )*
  };
}

// ─── Calendar age ────────────────────────────────────────────────────────────

/// Whole years elapsed from `from` to `today`, counted the way a birthday is:
/// the current year only counts once its anniversary has been reached.
///
/// A `from` after `today` yields the negated count in the other direction.
pub fn full_years_between(from: NaiveDate, today: NaiveDate) -> i32 {
  if from > today {
    return -full_years_between(today, from);
  }
  let mut years = today.year() - from.year();
  if (today.month(), today.day()) < (from.month(), from.day()) {
    years -= 1;
  }
  years
}

/// [`full_years_between`] over an optional start date.
pub fn years_since(from: Option<NaiveDate>, today: NaiveDate) -> Option<i32> {
  from.map(|d| full_years_between(d, today))
}

/// Round a monetary amount to whole cents.
pub fn round_cents(amount: f64) -> f64 { (amount * 100.0).round() / 100.0 }

/// `price − cost`, or zero when either side is unknown.
pub fn margin(price: Option<f64>, cost: Option<f64>) -> f64 {
  match (price, cost) {
    (Some(p), Some(c)) => round_cents(p - c),
    _ => 0.0,
  }
}

fn contains(haystack: Option<&str>, needle: &str) -> bool {
  haystack.is_some_and(|h| h.contains(needle))
}

// ─── Customers ───────────────────────────────────────────────────────────────

/// Loyalty segment derived from tenure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
  Vip,
  Regular,
  New,
}

impl Segment {
  pub fn from_tenure(years: Option<i32>) -> Self {
    match years {
      Some(y) if y >= 3 => Self::Vip,
      Some(y) if y >= 1 => Self::Regular,
      _ => Self::New,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Vip => "VIP",
      Self::Regular => "Regular",
      Self::New => "Nuevo",
    }
  }
}

/// City inferred from a free-text customer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerCity {
  Lima,
  Arequipa,
  Other,
}

impl CustomerCity {
  pub fn from_address(address: Option<&str>) -> Self {
    if contains(address, "Lima") {
      Self::Lima
    } else if contains(address, "Arequipa") {
      Self::Arequipa
    } else {
      Self::Other
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Lima => "Lima",
      Self::Arequipa => "Arequipa",
      Self::Other => "Otra",
    }
  }
}

// ─── Pets ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeGroup {
  Puppy,
  Adult,
  Senior,
}

impl AgeGroup {
  pub fn from_age(years: Option<i32>) -> Self {
    match years {
      Some(y) if y < 1 => Self::Puppy,
      Some(y) if y < 7 => Self::Adult,
      _ => Self::Senior,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Puppy => "Cachorro",
      Self::Adult => "Adulto",
      Self::Senior => "Senior",
    }
  }
}

/// Size bucket; only meaningful for dogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
  Small,
  Medium,
  Large,
  NotApplicable,
}

impl SizeClass {
  pub fn classify(species: Option<&str>, weight_kg: Option<f64>) -> Self {
    if species != Some(DOG_SPECIES) {
      return Self::NotApplicable;
    }
    match weight_kg {
      Some(w) if w < 10.0 => Self::Small,
      Some(w) if w < 25.0 => Self::Medium,
      _ => Self::Large,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Small => "Pequeño",
      Self::Medium => "Mediano",
      Self::Large => "Grande",
      Self::NotApplicable => "N/A",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreedCategory {
  Mixed,
  Purebred,
}

impl BreedCategory {
  pub fn from_breed(breed: Option<&str>) -> Self {
    if contains(breed, "Mestizo") { Self::Mixed } else { Self::Purebred }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Mixed => "Mestizo",
      Self::Purebred => "Pura Raza",
    }
  }
}

// ─── Veterinarians ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialtyCategory {
  General,
  Specialist,
}

impl SpecialtyCategory {
  pub fn from_specialty(specialty: Option<&str>) -> Self {
    if specialty == Some(GENERAL_SPECIALTY) {
      Self::General
    } else {
      Self::Specialist
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::General => "General",
      Self::Specialist => "Especialista",
    }
  }
}

// ─── Sites ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
  LimaMetropolitana,
  South,
  North,
  Central,
}

impl Region {
  pub fn from_city(city: Option<&str>) -> Self {
    match city {
      Some("Lima") => Self::LimaMetropolitana,
      Some("Arequipa" | "Cusco") => Self::South,
      Some("Trujillo" | "Chiclayo" | "Piura") => Self::North,
      _ => Self::Central,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::LimaMetropolitana => "Lima Metropolitana",
      Self::South => "Sur",
      Self::North => "Norte",
      Self::Central => "Centro",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
  Centre,
  Lima,
  Province,
}

impl Zone {
  pub fn classify(name: Option<&str>, city: Option<&str>) -> Self {
    if contains(name, "Central") {
      Self::Centre
    } else if city == Some("Lima") {
      Self::Lima
    } else {
      Self::Province
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Centre => "Centro",
      Self::Lima => "Lima",
      Self::Province => "Provincia",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteType {
  Central,
  Branch,
}

impl SiteType {
  pub fn from_name(name: Option<&str>) -> Self {
    if contains(name, "Central") { Self::Central } else { Self::Branch }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Central => "Central",
      Self::Branch => "Sucursal",
    }
  }
}

label_display!(
  Segment,
  CustomerCity,
  AgeGroup,
  SizeClass,
  BreedCategory,
  SpecialtyCategory,
  Region,
  Zone,
  SiteType,
);

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn full_years_counts_anniversaries() {
    let today = d(2026, 10, 14);
    assert_eq!(full_years_between(d(2023, 10, 14), today), 3);
    assert_eq!(full_years_between(d(2023, 10, 15), today), 2);
    assert_eq!(full_years_between(d(2026, 10, 14), today), 0);
    assert_eq!(full_years_between(d(2027, 1, 1), today), 0);
    assert_eq!(full_years_between(d(2028, 10, 14), today), -2);
  }

  #[test]
  fn full_years_handles_leap_day_births() {
    let born = d(2024, 2, 29);
    assert_eq!(full_years_between(born, d(2025, 2, 28)), 0);
    assert_eq!(full_years_between(born, d(2025, 3, 1)), 1);
  }

  #[test]
  fn segment_boundaries_are_inclusive() {
    let today = d(2026, 10, 14);
    let seg = |from| Segment::from_tenure(years_since(Some(from), today));
    assert_eq!(seg(d(2023, 10, 14)), Segment::Vip);
    assert_eq!(seg(d(2025, 10, 14)), Segment::Regular);
    assert_eq!(seg(d(2025, 10, 15)), Segment::New);
    assert_eq!(Segment::from_tenure(None), Segment::New);
    assert_eq!(Segment::Vip.to_string(), "VIP");
  }

  #[test]
  fn age_group_thresholds() {
    assert_eq!(AgeGroup::from_age(Some(0)), AgeGroup::Puppy);
    assert_eq!(AgeGroup::from_age(Some(1)), AgeGroup::Adult);
    assert_eq!(AgeGroup::from_age(Some(6)), AgeGroup::Adult);
    assert_eq!(AgeGroup::from_age(Some(7)), AgeGroup::Senior);
    assert_eq!(AgeGroup::from_age(None), AgeGroup::Senior);
  }

  #[test]
  fn size_applies_to_dogs_only() {
    assert_eq!(SizeClass::classify(Some("Perro"), Some(9.99)), SizeClass::Small);
    assert_eq!(SizeClass::classify(Some("Perro"), Some(10.0)), SizeClass::Medium);
    assert_eq!(SizeClass::classify(Some("Perro"), Some(25.0)), SizeClass::Large);
    assert_eq!(SizeClass::classify(Some("Perro"), None), SizeClass::Large);
    assert_eq!(SizeClass::classify(Some("Gato"), Some(4.0)), SizeClass::NotApplicable);
    assert_eq!(SizeClass::classify(None, Some(4.0)), SizeClass::NotApplicable);
    assert_eq!(SizeClass::Small.as_str(), "Pequeño");
  }

  #[test]
  fn site_rules() {
    assert_eq!(Region::from_city(Some("Lima")), Region::LimaMetropolitana);
    assert_eq!(Region::from_city(Some("Cusco")), Region::South);
    assert_eq!(Region::from_city(Some("Piura")), Region::North);
    assert_eq!(Region::from_city(Some("Huancayo")), Region::Central);
    assert_eq!(Region::from_city(None), Region::Central);

    assert_eq!(Zone::classify(Some("Sede Central"), Some("Arequipa")), Zone::Centre);
    assert_eq!(Zone::classify(Some("Sede Miraflores"), Some("Lima")), Zone::Lima);
    assert_eq!(Zone::classify(Some("Sede Norte"), Some("Piura")), Zone::Province);

    assert_eq!(SiteType::from_name(Some("Clínica Central")), SiteType::Central);
    assert_eq!(SiteType::from_name(None), SiteType::Branch);
  }

  #[test]
  fn keyword_rules_are_case_sensitive() {
    assert_eq!(CustomerCity::from_address(Some("Av. Arequipa 123, Lima")), CustomerCity::Lima);
    assert_eq!(CustomerCity::from_address(Some("calle lima 5")), CustomerCity::Other);
    assert_eq!(BreedCategory::from_breed(Some("Mestizo")), BreedCategory::Mixed);
    assert_eq!(BreedCategory::from_breed(Some("Beagle")), BreedCategory::Purebred);
    assert_eq!(
      SpecialtyCategory::from_specialty(Some("Cirugía")),
      SpecialtyCategory::Specialist
    );
  }

  #[test]
  fn margin_defaults_to_zero() {
    assert_eq!(margin(Some(100.0), Some(60.0)), 40.0);
    assert_eq!(margin(Some(100.0), None), 0.0);
    assert_eq!(margin(None, Some(3.0)), 0.0);
  }
}
