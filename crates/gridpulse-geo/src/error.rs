//! Error types for the geo enrichment service.

use thiserror::Error;

/// Result type alias for geo operations.
pub type GeoResult<T> = Result<T, GeoError>;

/// Errors that can occur during a geo lookup.
///
/// These stay internal to the service: callers always receive a
/// `GeoLocation` (all-null on failure), never an error.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("transport error looking up {ip}: {message}")]
    Transport { ip: String, message: String },

    #[error("http status {status} looking up {ip}")]
    Status { ip: String, status: u16 },

    #[error("invalid lookup response for {ip}: {message}")]
    Decode { ip: String, message: String },

    #[error("lookup API rejected {ip}: {reason}")]
    Rejected { ip: String, reason: String },
}
