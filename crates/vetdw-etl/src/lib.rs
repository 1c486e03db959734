//! Phase orchestration for the veterinary warehouse loader.
//!
//! [`Pipeline`] drives any [`vetdw_core::store::Warehouse`] through the
//! dimension and fact phases; [`EtlConfig`] is the deserialised runtime
//! configuration the binary builds it from.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::EtlConfig;
pub use error::PipelineError;
pub use pipeline::{Phase, Pipeline, RunSummary};
