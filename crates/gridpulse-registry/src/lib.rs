//! gridpulse-registry — merges polled fleet snapshots into the registry.
//!
//! Each reconciliation run partitions the snapshot into valid entries (both
//! an identity key and an address) and invalid ones, scores the valid set,
//! resolves identity transitions (an address shedding its synthetic identity
//! for a real key), deduplicates by key, and upserts through the state store.
//!
//! A run fails only when the entire snapshot is empty; per-node problems
//! demote that single node to invalid.

pub mod error;
pub mod reconciler;

pub use error::{ReconcileError, ReconcileResult};
pub use reconciler::{synthetic_key, ReconcileOutcome, Reconciler};
