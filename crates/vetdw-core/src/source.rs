//! Operational source records, one per dimension, and the attributes derived
//! from them at insert time.
//!
//! Business columns are optional because the operational schema does not
//! guarantee them; only natural keys are required.

use chrono::NaiveDate;

use crate::classify::{
  AgeGroup, BreedCategory, CustomerCity, Region, Segment, SiteType, SizeClass,
  SpecialtyCategory, Zone, margin, years_since,
};

/// `first last`, or `None` when either half is missing.
fn full_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
  match (first, last) {
    (Some(f), Some(l)) => Some(format!("{f} {l}")),
    _ => None,
  }
}

// ─── Customer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Customer {
  pub customer_id:       i64,
  pub first_name:        Option<String>,
  pub last_name:         Option<String>,
  pub dni:               Option<String>,
  pub phone:             Option<String>,
  pub email:             Option<String>,
  pub address:           Option<String>,
  pub registration_date: Option<NaiveDate>,
  pub status:            Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerAttributes {
  pub full_name:    Option<String>,
  pub city:         CustomerCity,
  pub tenure_years: Option<i32>,
  pub segment:      Segment,
}

impl Customer {
  pub fn derive(&self, today: NaiveDate) -> CustomerAttributes {
    let tenure_years = years_since(self.registration_date, today);
    CustomerAttributes {
      full_name: full_name(self.first_name.as_deref(), self.last_name.as_deref()),
      city: CustomerCity::from_address(self.address.as_deref()),
      tenure_years,
      segment: Segment::from_tenure(tenure_years),
    }
  }
}

// ─── Pet ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Pet {
  pub pet_id:      i64,
  pub name:        Option<String>,
  pub species:     Option<String>,
  pub breed:       Option<String>,
  pub sex:         Option<String>,
  pub color:       Option<String>,
  pub weight_kg:   Option<f64>,
  pub birth_date:  Option<NaiveDate>,
  pub status:      Option<String>,
  /// Owning customer's natural key.
  pub customer_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetAttributes {
  pub age_years:      Option<i32>,
  pub age_group:      AgeGroup,
  pub size:           SizeClass,
  pub breed_category: BreedCategory,
}

impl Pet {
  pub fn derive(&self, today: NaiveDate) -> PetAttributes {
    let age_years = years_since(self.birth_date, today);
    PetAttributes {
      age_years,
      age_group: AgeGroup::from_age(age_years),
      size: SizeClass::classify(self.species.as_deref(), self.weight_kg),
      breed_category: BreedCategory::from_breed(self.breed.as_deref()),
    }
  }
}

// ─── Veterinarian ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Veterinarian {
  pub veterinarian_id: i64,
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub dni:             Option<String>,
  pub license_number:  Option<String>,
  pub specialty:       Option<String>,
  pub phone:           Option<String>,
  pub email:           Option<String>,
  pub hire_date:       Option<NaiveDate>,
  pub site_id:         Option<i64>,
  pub status:          Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VeterinarianAttributes {
  pub full_name:          Option<String>,
  pub specialty_category: SpecialtyCategory,
  pub years_experience:   Option<i32>,
}

impl Veterinarian {
  pub fn derive(&self, today: NaiveDate) -> VeterinarianAttributes {
    VeterinarianAttributes {
      full_name:          full_name(self.first_name.as_deref(), self.last_name.as_deref()),
      specialty_category: SpecialtyCategory::from_specialty(self.specialty.as_deref()),
      years_experience:   years_since(self.hire_date, today),
    }
  }
}

// ─── Site ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Site {
  pub site_id: i64,
  pub name:    Option<String>,
  pub address: Option<String>,
  pub city:    Option<String>,
  pub phone:   Option<String>,
  pub status:  Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteAttributes {
  pub region:    Region,
  pub zone:      Zone,
  pub site_type: SiteType,
}

impl Site {
  /// Site rules do not depend on the reference date.
  pub fn derive(&self) -> SiteAttributes {
    let name = self.name.as_deref();
    let city = self.city.as_deref();
    SiteAttributes {
      region:    Region::from_city(city),
      zone:      Zone::classify(name, city),
      site_type: SiteType::from_name(name),
    }
  }
}

// ─── Product / Service ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Product {
  pub product_id:    i64,
  pub name:          Option<String>,
  pub description:   Option<String>,
  pub kind:          Option<String>,
  pub category:      Option<String>,
  pub unit:          Option<String>,
  pub price:         Option<f64>,
  pub cost:          Option<f64>,
  pub supplier_id:   Option<i64>,
  /// Joined from the supplier table; `None` when the supplier is unknown.
  pub supplier_name: Option<String>,
  pub status:        Option<String>,
}

impl Product {
  pub fn margin(&self) -> f64 { margin(self.price, self.cost) }
}

#[derive(Debug, Clone, Default)]
pub struct Service {
  pub service_id:       i64,
  pub name:             Option<String>,
  pub description:      Option<String>,
  pub category:         Option<String>,
  pub duration_minutes: Option<i64>,
  pub price:            Option<f64>,
  pub cost:             Option<f64>,
  pub status:           Option<String>,
}

impl Service {
  pub fn margin(&self) -> f64 { margin(self.price, self.cost) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn today() -> NaiveDate { NaiveDate::from_ymd_opt(2026, 10, 14).unwrap() }

  #[test]
  fn customer_derivation() {
    let c = Customer {
      customer_id: 1,
      first_name: Some("Ana".into()),
      last_name: Some("Quispe".into()),
      address: Some("Jr. Junín 400, Lima".into()),
      registration_date: NaiveDate::from_ymd_opt(2024, 1, 10),
      ..Default::default()
    };
    let attrs = c.derive(today());
    assert_eq!(attrs.full_name.as_deref(), Some("Ana Quispe"));
    assert_eq!(attrs.city, CustomerCity::Lima);
    assert_eq!(attrs.tenure_years, Some(2));
    assert_eq!(attrs.segment, Segment::Regular);
  }

  #[test]
  fn missing_last_name_leaves_full_name_empty() {
    let c = Customer { customer_id: 2, first_name: Some("Luis".into()), ..Default::default() };
    let attrs = c.derive(today());
    assert!(attrs.full_name.is_none());
    assert_eq!(attrs.segment, Segment::New);
  }

  #[test]
  fn pet_derivation() {
    let p = Pet {
      pet_id: 7,
      species: Some("Perro".into()),
      breed: Some("Mestizo".into()),
      weight_kg: Some(18.5),
      birth_date: NaiveDate::from_ymd_opt(2018, 3, 1),
      ..Default::default()
    };
    let attrs = p.derive(today());
    assert_eq!(attrs.age_years, Some(8));
    assert_eq!(attrs.age_group, AgeGroup::Senior);
    assert_eq!(attrs.size, SizeClass::Medium);
    assert_eq!(attrs.breed_category, BreedCategory::Mixed);
  }

  #[test]
  fn product_margin_uses_price_and_cost() {
    let p = Product { product_id: 1, price: Some(45.5), cost: Some(30.25), ..Default::default() };
    assert_eq!(p.margin(), 15.25);
    let s = Service { service_id: 1, price: Some(80.0), ..Default::default() };
    assert_eq!(s.margin(), 0.0);
  }
}
