//! Error types for the RPC client.

use thiserror::Error;

/// Result type alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors that can occur during an RPC call.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("no rpc endpoints configured")]
    NoEndpoints,

    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    #[error("http status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("rpc error {code} from {url}: {message}")]
    Rpc {
        url: String,
        code: i64,
        message: String,
    },

    #[error("response from {url} carried neither result nor error")]
    EmptyResponse { url: String },

    #[error("all rpc endpoints exhausted; last error: {0}")]
    Exhausted(#[source] Box<RpcError>),
}

impl RpcError {
    /// The failure that ended the final attempt, unwrapped.
    pub fn last_cause(&self) -> &RpcError {
        match self {
            RpcError::Exhausted(inner) => inner,
            other => other,
        }
    }
}
