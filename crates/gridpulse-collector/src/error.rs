//! Error types for collection cycles.

use thiserror::Error;

use gridpulse_registry::ReconcileError;
use gridpulse_rpc::RpcError;
use gridpulse_state::StateError;

/// Result type alias for collection cycles.
pub type CollectResult<T> = Result<T, CollectError>;

/// Errors that fail a whole cycle.
///
/// Per-node detail failures and geo lookup failures are contained inside the
/// cycle and never appear here; they show up as counts in the summary.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("fleet poll failed: {0}")]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    State(#[from] StateError),
}
