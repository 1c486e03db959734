//! SQLite backend for the veterinary warehouse loader.
//!
//! The operational database is opened as the main schema and the warehouse
//! database is attached as `dw`, so a single connection (and a single
//! transaction) spans both.

mod dimension;
mod encode;
mod fact;
mod store;
mod time;

pub mod error;
pub mod schema;

pub use error::{Error, Result};
pub use store::{SqliteSession, SqliteWarehouse};

#[cfg(test)]
mod tests;
