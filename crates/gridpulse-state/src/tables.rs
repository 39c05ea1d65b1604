//! redb table definitions for the GridPulse state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Time-series keys embed the epoch so the same collection window
//! upserts in place: `{pubkey}:{epoch}` and `{epoch}`.

use redb::TableDefinition;

/// Registry rows keyed by `{pubkey}` (real or synthetic).
pub const PNODES: TableDefinition<&str, &[u8]> = TableDefinition::new("pnodes");

/// Per-node time series keyed by `{pubkey}:{epoch}`.
pub const PNODE_STATS: TableDefinition<&str, &[u8]> = TableDefinition::new("pnode_stats");

/// Network singleton, stored under the fixed key `"network"`.
pub const NETWORK: TableDefinition<&str, &[u8]> = TableDefinition::new("network");

/// Fleet-wide time series keyed by `{epoch}`.
pub const NETWORK_STATS: TableDefinition<&str, &[u8]> = TableDefinition::new("network_stats");
