//! Core types and trait definitions for the veterinary warehouse loader.
//!
//! This crate has no database dependencies. It owns the
//! classification rules, the dimension/fact vocabulary, and the generic
//! historization procedure; storage backends implement [`store::Warehouse`].

pub mod classify;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod source;
pub mod store;

pub use error::{Error, Result};
