//! Error types for `vetdw-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A stored discriminant did not match any known variant.
  #[error("unknown {kind} label: {value:?}")]
  UnknownLabel { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
