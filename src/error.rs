//! Crate-level error type

use crate::execution::ActuationError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the optimizer to its caller.
///
/// Per-recommendation failures (safety rejection, actuator fault) are NOT
/// errors at this level — they are recorded on the recommendation as
/// `Failed` and the cycle carries on. Only abnormal conditions that stop a
/// cycle or an operation reach this type.
#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("invalid sensor state: {reason}")]
    Validation { reason: String },

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("actuation error: {0}")]
    Actuation(#[from] ActuationError),

    #[error("policy error: {reason}")]
    Policy { reason: String },
}
