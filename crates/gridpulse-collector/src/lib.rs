//! gridpulse-collector — the collection pipeline driver.
//!
//! Two cadences share the reconciler and scorer but differ in polling depth:
//!
//! - **Basic cycle** (frequent): one fleet-wide RPC call, reconciliation, a
//!   basic time-series row per valid node at the minute-bucketed epoch, and
//!   a recompute of the network singleton.
//! - **Detailed cycle** (hourly): the basic cycle's work first, then one
//!   per-node RPC call to every public, online node in bounded-concurrency
//!   batches. Each success patches the node's existing time-series row for
//!   the same epoch. A fleet time-series row follows, with heavy aggregates
//!   computed only over this cycle's responders.
//!
//! Each cycle returns a structured summary (counts, timing, coverage); only
//! fleet-level and persistence errors propagate as cycle failure.

pub mod aggregate;
pub mod collector;
pub mod error;

pub use collector::{
    BasicCycleSummary, Collector, CollectorConfig, DetailedCycleSummary, PruneSummary,
};
pub use error::{CollectError, CollectResult};
