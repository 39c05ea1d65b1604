//! gridpulse-geo — geographic enrichment for node addresses.
//!
//! Resolves an IP (or `ip:port`) address to a [`GeoLocation`] through an
//! external HTTP lookup API, fronted by a TTL cache so an address is looked
//! up at most once per window. Batch resolution fans out in fixed-size
//! chunks with an inter-chunk pause to respect upstream rate limits.
//!
//! Failure semantics: an API-reported error or non-2xx status yields the
//! all-null location and is NOT cached, so the next eligible cycle retries.
//! A partial payload (some fields resolved, some missing) is logged, kept,
//! and cached as-is.

pub mod error;
pub mod service;

pub use error::{GeoError, GeoResult};
pub use service::{GeoConfig, GeoService};
