//! Error type for the phase orchestrator.

use thiserror::Error;

use crate::pipeline::Phase;

#[derive(Debug, Error)]
pub enum PipelineError<E: std::error::Error + 'static> {
  /// `run` was called on a pipeline that is not idle.
  #[error("pipeline is not idle (phase: {0})")]
  NotIdle(Phase),

  /// A storage operation failed; its transaction has been rolled back.
  #[error("{phase} failed at {target}: {source}")]
  Storage {
    phase:  Phase,
    /// Table (or `transaction`) the failing operation was working on.
    target: &'static str,
    #[source]
    source: E,
  },
}

impl<E: std::error::Error + 'static> PipelineError<E> {
  /// The phase the pipeline was in when the error occurred.
  pub fn phase(&self) -> Phase {
    match self {
      Self::NotIdle(phase) | Self::Storage { phase, .. } => *phase,
    }
  }
}
