//! gridpulse-rpc — JSON-RPC 2.0 client for pNode endpoints.
//!
//! Issues `{"jsonrpc":"2.0","method":…,"params":[…],"id":…}` calls over HTTP
//! with per-attempt timeouts, per-URL retry with exponential backoff, and
//! ordered failover from the bootstrap URL through the configured fallbacks.
//! A response carrying a non-null `error` member is a terminal failure for
//! that attempt (it still consumes a retry; the client does not advance to
//! the next URL early). Only after every attempt against every candidate URL
//! has failed does a call surface an error, citing the last failure observed.
//!
//! Typed wrappers decode each fleet entry defensively: a malformed entry
//! becomes an empty [`PolledEntry`] for the reconciler to demote, never a
//! call-level failure.

pub mod client;
pub mod error;
pub mod wire;

pub use client::{node_rpc_url, RpcClient, RpcConfig};
pub use error::{RpcError, RpcResult};
pub use wire::{methods, NodeMetrics, PolledEntry};
