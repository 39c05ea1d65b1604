//! Domain types for the GridPulse state store.
//!
//! These types represent the persisted pNode registry, per-node and
//! fleet-wide time series, and the network singleton. All types are
//! serializable to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};

use crate::bytes::ByteCount;

/// Stable identity key for a pNode (a base58 pubkey, or a synthetic
/// `invalid-…` identifier when the node reported none).
pub type Pubkey = String;

/// Reported version strings are bounded to this length at rest.
pub const MAX_VERSION_LEN: usize = 32;

/// Truncate a node-reported version string to [`MAX_VERSION_LEN`].
pub fn truncate_version(version: &str) -> String {
    let trimmed = version.trim();
    match trimmed.char_indices().nth(MAX_VERSION_LEN) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Registry ──────────────────────────────────────────────────────

/// Health classification of a registry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Online,
    Degraded,
    Offline,
    /// Entered and exited only through identity handling, never by score.
    Invalid,
}

/// Geographic metadata resolved from a node's IP address.
///
/// All fields are optional together: a failed lookup is the all-`None` value,
/// and existing data is sticky — it is never overwritten with `None`s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoLocation {
    /// True when no field resolved (the failure shape).
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.country_code.is_none()
            && self.city.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }

    /// True when every field resolved; incomplete rows are re-enriched.
    pub fn is_complete(&self) -> bool {
        self.country.is_some()
            && self.country_code.is_some()
            && self.city.is_some()
            && self.latitude.is_some()
            && self.longitude.is_some()
    }
}

/// One registry row per known pNode, keyed by [`PNode::pubkey`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PNode {
    pub pubkey: Pubkey,
    pub ip_address: String,
    pub gossip_port: u16,
    pub rpc_port: u16,
    /// `ip:port` composite the node advertises for peer discovery.
    pub gossip_address: String,
    /// Whether the node's RPC endpoint is externally reachable.
    pub is_public: bool,
    pub version: String,
    pub status: NodeStatus,
    pub storage_committed: ByteCount,
    pub storage_used: ByteCount,
    /// 0–100.
    pub storage_usage_percent: f64,
    pub uptime_secs: u64,
    /// Epoch seconds as reported by the node itself.
    pub last_seen_timestamp: u64,
    /// Collector-observed timestamps (epoch seconds).
    pub first_seen_at: u64,
    pub last_seen_at: u64,
    pub updated_at: u64,
    #[serde(default)]
    pub geo: GeoLocation,
    /// 0–100, recomputed every collection cycle.
    pub health_score: u8,
}

impl PNode {
    /// Key for the registry table.
    pub fn table_key(&self) -> &str {
        &self.pubkey
    }
}

// ── Per-node time series ──────────────────────────────────────────

/// One time-series row per `(pubkey, epoch)`.
///
/// The basic snapshot fields are always present; heavy fields stay `None`
/// unless the detailed poll reached the node within the same collection
/// window, in which case the existing row is patched in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PNodeStats {
    pub pubkey: Pubkey,
    /// Collection window start (epoch seconds, minute-bucketed).
    pub epoch: u64,
    pub storage_committed: ByteCount,
    pub storage_used: ByteCount,
    pub storage_usage_percent: f64,
    pub uptime_secs: u64,
    pub health_score: u8,
    pub status: NodeStatus,
    pub cpu_percent: Option<f64>,
    pub ram_used: Option<u64>,
    pub ram_total: Option<u64>,
    pub active_streams: Option<u64>,
    pub packets_received: Option<u64>,
    pub packets_sent: Option<u64>,
    pub total_bytes: Option<ByteCount>,
    pub total_pages: Option<u64>,
    pub current_index: Option<u64>,
}

impl PNodeStats {
    /// Build the composite key for the per-node stats table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.pubkey, self.epoch)
    }

    /// True once a detailed poll populated the heavy fields.
    pub fn has_detailed(&self) -> bool {
        self.cpu_percent.is_some()
    }
}

// ── Fleet rollups ─────────────────────────────────────────────────

/// Fleet-wide rollup singleton, recomputed from every basic cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Network {
    pub total_nodes: u32,
    pub online_nodes: u32,
    pub degraded_nodes: u32,
    pub offline_nodes: u32,
    pub invalid_nodes: u32,
    pub public_nodes: u32,
    pub private_nodes: u32,
    pub total_storage_committed: ByteCount,
    pub total_storage_used: ByteCount,
    pub avg_storage_usage_percent: f64,
    pub avg_uptime_secs: f64,
    pub avg_health_score: f64,
    /// Percent of the fleet eligible for heavy polling (public nodes).
    pub detailed_stats_coverage: f64,
    pub updated_at: u64,
}

/// Fleet-wide time-series row produced by the detailed cycle.
///
/// Counts and storage totals cover every valid node; the heavy aggregates
/// cover only the subset that returned detailed stats this cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkStats {
    /// Collection window start (epoch seconds, minute-bucketed).
    pub epoch: u64,
    pub total_nodes: u32,
    pub online_nodes: u32,
    pub degraded_nodes: u32,
    pub offline_nodes: u32,
    pub invalid_nodes: u32,
    pub public_nodes: u32,
    pub private_nodes: u32,
    pub total_storage_committed: ByteCount,
    pub total_storage_used: ByteCount,
    pub avg_storage_usage_percent: f64,
    pub avg_uptime_secs: f64,
    pub avg_health_score: f64,
    /// Number of nodes whose detailed poll succeeded this cycle.
    pub reporting_nodes: u32,
    pub avg_cpu_percent: f64,
    pub total_ram_used: u64,
    pub total_ram_total: u64,
    pub total_active_streams: u64,
    pub total_packets_received: u64,
    pub total_packets_sent: u64,
    pub total_bytes: ByteCount,
    pub total_pages: u64,
    pub detailed_success: u32,
    pub detailed_failed: u32,
    pub detailed_stats_coverage: f64,
}

impl NetworkStats {
    /// Key for the fleet stats table.
    pub fn table_key(&self) -> String {
        self.epoch.to_string()
    }
}
