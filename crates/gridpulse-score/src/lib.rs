//! gridpulse-score — per-node health scoring.
//!
//! A pure function from raw node vitals to a 0–100 health score, and the
//! score-to-status classification that drives both registry status and the
//! fleet-wide online/degraded/offline counts. No I/O, no clock: callers
//! derive the recency inputs before scoring.
//!
//! # Scoring
//!
//! ```text
//! offline                  → 0 (regardless of other factors)
//! online base              → +40
//! recency    (0–20)        → <1m +20, <5m +15, <10m +10, <30m +5
//! storage    (0–15)        → 0% +5 (new node), ≤70% +15, ≤85% +10, ≤95% +5
//! cpu        (0–10)        → ≤20% +10, ≤50% +7, ≤80% +4, else +1
//! uptime     (0–15)        → ≥168h +15, ≥72h +12, ≥24h +9, ≥6h +6, ≥1h +3
//! ```
//!
//! Status: score 0 → Offline, score ≥70 → Online, otherwise Degraded.

pub mod score;

pub use score::{score, status_for, NodeVitals, ONLINE_WINDOW_MINUTES};
