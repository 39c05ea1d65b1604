//! gridpulse-state — embedded state store for GridPulse.
//!
//! Backed by [redb](https://docs.rs/redb), persists the pNode registry, the
//! per-node and fleet-wide time series, and the network singleton.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Registry rows are keyed by `{pubkey}`; time-series rows by
//! `{pubkey}:{epoch}` (per-node) or `{epoch}` (fleet), so re-collection at the
//! same epoch upserts instead of duplicating and prefix scans fetch a single
//! node's history.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod bytes;
pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use bytes::ByteCount;
pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
