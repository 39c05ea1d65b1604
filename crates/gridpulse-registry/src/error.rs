//! Error types for registry reconciliation.

use thiserror::Error;

use gridpulse_state::StateError;

/// Result type alias for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The fatal precondition: nothing was polled, so nothing is written.
    #[error("fleet snapshot is empty")]
    EmptyFleet,

    #[error(transparent)]
    State(#[from] StateError),
}
