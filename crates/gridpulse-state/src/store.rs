//! StateStore — redb-backed persistence for GridPulse.
//!
//! Provides typed upsert/read operations over the pNode registry, per-node
//! and fleet-wide time series, and the network singleton. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports both
//! on-disk and in-memory backends (the latter for testing).
//!
//! Every write is an idempotent upsert keyed by stable identity (`pubkey`) or
//! composite key (`{pubkey}:{epoch}`), so a collection cycle re-run with the
//! same inputs converges to the same rows.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Fixed key under which the [`Network`] singleton is stored.
const NETWORK_KEY: &str = "network";

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(PNODES).map_err(map_err!(Table))?;
        txn.open_table(PNODE_STATS).map_err(map_err!(Table))?;
        txn.open_table(NETWORK).map_err(map_err!(Table))?;
        txn.open_table(NETWORK_STATS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Insert or update a registry row.
    pub fn put_pnode(&self, node: &PNode) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PNODES).map_err(map_err!(Table))?;
            table
                .insert(node.table_key(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a registry row by pubkey.
    pub fn get_pnode(&self, pubkey: &str) -> StateResult<Option<PNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PNODES).map_err(map_err!(Table))?;
        match table.get(pubkey).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: PNode =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all registry rows.
    pub fn list_pnodes(&self) -> StateResult<Vec<PNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PNODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: PNode =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    /// Find a registry row by its gossip address (linear scan).
    ///
    /// The registry holds at most one live row per network address, so the
    /// first match wins.
    pub fn find_pnode_by_address(&self, gossip_address: &str) -> StateResult<Option<PNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PNODES).map_err(map_err!(Table))?;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: PNode =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if node.gossip_address == gossip_address {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Delete a registry row by pubkey. Returns true if it existed.
    pub fn delete_pnode(&self, pubkey: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(PNODES).map_err(map_err!(Table))?;
            existed = table.remove(pubkey).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%pubkey, existed, "registry row deleted");
        Ok(existed)
    }

    // ── Per-node time series ───────────────────────────────────────

    /// Insert or replace the stats row for `(pubkey, epoch)`.
    pub fn put_pnode_stats(&self, stats: &PNodeStats) -> StateResult<()> {
        let key = stats.table_key();
        let value = serde_json::to_vec(stats).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PNODE_STATS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get the stats row for `(pubkey, epoch)`, if collected.
    pub fn get_pnode_stats(&self, pubkey: &str, epoch: u64) -> StateResult<Option<PNodeStats>> {
        let key = format!("{pubkey}:{epoch}");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PNODE_STATS).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let stats: PNodeStats =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(stats))
            }
            None => Ok(None),
        }
    }

    /// List up to `limit` stats rows for one node (by key prefix scan).
    pub fn list_pnode_stats(&self, pubkey: &str, limit: usize) -> StateResult<Vec<PNodeStats>> {
        let prefix = format!("{pubkey}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PNODE_STATS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let stats: PNodeStats =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(stats);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// Delete per-node stats rows older than `cutoff_epoch`. Returns the
    /// number of rows removed.
    pub fn prune_pnode_stats_before(&self, cutoff_epoch: u64) -> StateResult<u32> {
        // Collect keys in a read transaction first.
        let keys: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(PNODE_STATS).map_err(map_err!(Table))?;
            table
                .iter()
                .map_err(map_err!(Read))?
                .filter_map(|entry| {
                    let (key, value) = entry.ok()?;
                    let stats: PNodeStats = serde_json::from_slice(value.value()).ok()?;
                    (stats.epoch < cutoff_epoch).then(|| key.value().to_string())
                })
                .collect()
        };
        // Delete in a write transaction.
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = keys.len() as u32;
        {
            let mut table = txn.open_table(PNODE_STATS).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(count)
    }

    // ── Network singleton ──────────────────────────────────────────

    /// Replace the network singleton.
    pub fn put_network(&self, network: &Network) -> StateResult<()> {
        let value = serde_json::to_vec(network).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NETWORK).map_err(map_err!(Table))?;
            table
                .insert(NETWORK_KEY, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get the network singleton, if a cycle has run.
    pub fn get_network(&self) -> StateResult<Option<Network>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NETWORK).map_err(map_err!(Table))?;
        match table.get(NETWORK_KEY).map_err(map_err!(Read))? {
            Some(guard) => {
                let network: Network =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(network))
            }
            None => Ok(None),
        }
    }

    // ── Fleet time series ──────────────────────────────────────────

    /// Insert or replace the fleet stats row for its epoch.
    pub fn put_network_stats(&self, stats: &NetworkStats) -> StateResult<()> {
        let key = stats.table_key();
        let value = serde_json::to_vec(stats).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NETWORK_STATS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// List all fleet stats rows.
    pub fn list_network_stats(&self) -> StateResult<Vec<NetworkStats>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NETWORK_STATS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let stats: NetworkStats =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(stats);
        }
        Ok(results)
    }

    /// Delete fleet stats rows older than `cutoff_epoch`. Returns the number
    /// of rows removed.
    pub fn prune_network_stats_before(&self, cutoff_epoch: u64) -> StateResult<u32> {
        let keys: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(NETWORK_STATS).map_err(map_err!(Table))?;
            table
                .iter()
                .map_err(map_err!(Read))?
                .filter_map(|entry| {
                    let (key, value) = entry.ok()?;
                    let stats: NetworkStats = serde_json::from_slice(value.value()).ok()?;
                    (stats.epoch < cutoff_epoch).then(|| key.value().to_string())
                })
                .collect()
        };
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = keys.len() as u32;
        {
            let mut table = txn.open_table(NETWORK_STATS).map_err(map_err!(Table))?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(count)
    }

    /// Delete registry rows not observed since `cutoff_epoch` (by collector
    /// timestamp). Returns the pubkeys removed.
    pub fn prune_pnodes_unseen_since(&self, cutoff_epoch: u64) -> StateResult<Vec<Pubkey>> {
        let stale: Vec<Pubkey> = self
            .list_pnodes()?
            .into_iter()
            .filter(|n| n.last_seen_at < cutoff_epoch)
            .map(|n| n.pubkey)
            .collect();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PNODES).map_err(map_err!(Table))?;
            for pubkey in &stale {
                table.remove(pubkey.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(stale)
    }
}
