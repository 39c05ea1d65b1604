//! The reconciler: snapshot + persisted registry → upserted rows.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use gridpulse_rpc::PolledEntry;
use gridpulse_score::{score, status_for, NodeVitals};
use gridpulse_state::{
    truncate_version, ByteCount, GeoLocation, NodeStatus, PNode, Pubkey, StateStore,
};

use crate::error::{ReconcileError, ReconcileResult};

/// Summary of one reconciliation run; the row vectors are what was upserted.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub valid: Vec<PNode>,
    pub invalid: Vec<PNode>,
    /// Invalid rows deleted because their address reported a real key.
    pub transitions: u32,
    /// Entries dropped by in-batch dedup (last write wins per key).
    pub duplicates: u32,
    /// Entries with neither key nor address; nothing to persist.
    pub skipped: u32,
}

/// Merges freshly polled fleet snapshots into the persisted registry.
pub struct Reconciler {
    store: StateStore,
}

impl Reconciler {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Reconcile one snapshot against the registry.
    ///
    /// `geo` holds this cycle's fresh enrichment results keyed by gossip
    /// address; rows fall back to their previously resolved location when no
    /// fresh (non-empty) entry is present.
    ///
    /// Duplicate keys within the snapshot resolve to the entry appearing
    /// last in batch iteration order — explicit last-write-wins.
    pub fn reconcile(
        &self,
        snapshot: &[PolledEntry],
        geo: &HashMap<String, GeoLocation>,
    ) -> ReconcileResult<ReconcileOutcome> {
        if snapshot.is_empty() {
            return Err(ReconcileError::EmptyFleet);
        }

        let now = epoch_secs();
        let known = self.store.list_pnodes()?;
        let by_pubkey: HashMap<&str, &PNode> =
            known.iter().map(|n| (n.pubkey.as_str(), n)).collect();
        let by_address: HashMap<&str, &PNode> = known
            .iter()
            .filter(|n| !n.gossip_address.is_empty())
            .map(|n| (n.gossip_address.as_str(), n))
            .collect();

        let mut outcome = ReconcileOutcome::default();
        let mut pending_valid: HashMap<Pubkey, PNode> = HashMap::new();
        let mut pending_invalid: HashMap<Pubkey, PNode> = HashMap::new();
        let mut valid_addresses: HashMap<String, Pubkey> = HashMap::new();

        // Partition and build pending rows. An entry is valid only with both
        // a non-empty key and a parseable address.
        for entry in snapshot {
            let pubkey = entry.pubkey.as_deref().filter(|k| !k.is_empty());
            let address = entry.address.as_deref().filter(|a| !a.is_empty());

            let parsed = address.and_then(split_address);
            match (pubkey, address, parsed) {
                (Some(key), Some(addr), Some((ip, port))) => {
                    let node = self.build_valid(entry, key, addr, ip, port, geo, &by_pubkey, now);
                    valid_addresses.insert(addr.to_string(), key.to_string());
                    if pending_valid.insert(key.to_string(), node).is_some() {
                        outcome.duplicates += 1;
                        debug!(%key, "duplicate key in batch, keeping the later entry");
                    }
                }
                (key, addr, _) => {
                    if key.is_none() && addr.is_none() {
                        outcome.skipped += 1;
                        continue;
                    }
                    if let Some(node) = self.build_invalid(entry, key, addr, &by_address, now) {
                        if pending_invalid.insert(node.pubkey.clone(), node).is_some() {
                            outcome.duplicates += 1;
                        }
                    } else {
                        outcome.skipped += 1;
                    }
                }
            }
        }

        // Identity transitions: an address that previously held an invalid
        // row and now reports a different, real key sheds the old row first.
        for node in pending_valid.values() {
            if let Some(existing) = by_address.get(node.gossip_address.as_str()) {
                if existing.status == NodeStatus::Invalid && existing.pubkey != node.pubkey {
                    self.store.delete_pnode(&existing.pubkey)?;
                    outcome.transitions += 1;
                    info!(
                        address = %node.gossip_address,
                        old_key = %existing.pubkey,
                        new_key = %node.pubkey,
                        "identity transition resolved"
                    );
                }
            }
        }

        // An invalid sighting whose address is claimed by a valid entry in
        // the same batch would recreate the row the transition just removed.
        pending_invalid.retain(|key, node| {
            if !node.gossip_address.is_empty() && valid_addresses.contains_key(&node.gossip_address)
            {
                debug!(%key, address = %node.gossip_address, "invalid sighting shadowed by valid entry");
                outcome.skipped += 1;
                return false;
            }
            true
        });

        for node in pending_valid.into_values() {
            self.store.put_pnode(&node)?;
            outcome.valid.push(node);
        }
        for node in pending_invalid.into_values() {
            self.store.put_pnode(&node)?;
            outcome.invalid.push(node);
        }

        info!(
            valid = outcome.valid.len(),
            invalid = outcome.invalid.len(),
            transitions = outcome.transitions,
            duplicates = outcome.duplicates,
            skipped = outcome.skipped,
            "registry reconciled"
        );
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_valid(
        &self,
        entry: &PolledEntry,
        pubkey: &str,
        address: &str,
        ip: &str,
        gossip_port: u16,
        geo: &HashMap<String, GeoLocation>,
        by_pubkey: &HashMap<&str, &PNode>,
        now: u64,
    ) -> PNode {
        let existing = by_pubkey.get(pubkey);

        let storage_committed = entry.storage_committed.unwrap_or(ByteCount::ZERO);
        let storage_used = entry.storage_used.unwrap_or(ByteCount::ZERO);
        let storage_usage_percent = storage_used.percent_of(storage_committed);
        let uptime_secs = entry.uptime_secs.unwrap_or(0);
        let last_seen_timestamp = entry.last_seen_timestamp.unwrap_or(now);
        let last_seen_minutes = now.saturating_sub(last_seen_timestamp) / 60;

        // Basic polls carry no CPU sample; 0 lands in the top band.
        let vitals = NodeVitals::observed(storage_usage_percent, 0.0, uptime_secs, last_seen_minutes);
        let health_score = score(&vitals);

        // Sticky geo: fresh enrichment wins, else whatever was resolved
        // before; a failed lookup never nulls out existing data.
        let fresh = geo.get(address).filter(|g| !g.is_empty()).cloned();
        let location = fresh
            .or_else(|| existing.map(|n| n.geo.clone()))
            .unwrap_or_default();

        let version = entry
            .version
            .as_deref()
            .map(truncate_version)
            .filter(|v| !v.is_empty())
            .or_else(|| existing.map(|n| n.version.clone()))
            .unwrap_or_default();

        PNode {
            pubkey: pubkey.to_string(),
            ip_address: ip.to_string(),
            gossip_port,
            rpc_port: entry.rpc_port.unwrap_or(0),
            gossip_address: address.to_string(),
            is_public: entry.is_public.unwrap_or(false),
            version,
            status: status_for(health_score),
            storage_committed,
            storage_used,
            storage_usage_percent,
            uptime_secs,
            last_seen_timestamp,
            first_seen_at: existing.map(|n| n.first_seen_at).unwrap_or(now),
            last_seen_at: now,
            updated_at: now,
            geo: location,
            health_score,
        }
    }

    /// Build an invalid row, reusing the identity already on file for the
    /// address so repeated sightings update instead of multiplying. Returns
    /// `None` when there is nothing to key the row by.
    fn build_invalid(
        &self,
        entry: &PolledEntry,
        pubkey: Option<&str>,
        address: Option<&str>,
        by_address: &HashMap<&str, &PNode>,
        now: u64,
    ) -> Option<PNode> {
        let gossip_address = address.unwrap_or_default();
        let existing = by_address.get(gossip_address).copied();

        let key = pubkey
            .map(str::to_string)
            .or_else(|| {
                existing
                    .filter(|n| n.status == NodeStatus::Invalid)
                    .map(|n| n.pubkey.clone())
            })
            .or_else(|| (!gossip_address.is_empty()).then(|| synthetic_key(gossip_address)))?;

        let (ip, gossip_port) = address.and_then(split_address).unwrap_or(("", 0));
        warn!(%key, address = %gossip_address, "invalid sighting recorded");

        Some(PNode {
            pubkey: key,
            ip_address: ip.to_string(),
            gossip_port,
            rpc_port: entry.rpc_port.unwrap_or(0),
            gossip_address: gossip_address.to_string(),
            is_public: false,
            version: entry
                .version
                .as_deref()
                .map(truncate_version)
                .unwrap_or_default(),
            status: NodeStatus::Invalid,
            storage_committed: ByteCount::ZERO,
            storage_used: ByteCount::ZERO,
            storage_usage_percent: 0.0,
            uptime_secs: 0,
            last_seen_timestamp: entry.last_seen_timestamp.unwrap_or(now),
            first_seen_at: existing.map(|n| n.first_seen_at).unwrap_or(now),
            last_seen_at: now,
            updated_at: now,
            geo: existing.map(|n| n.geo.clone()).unwrap_or_default(),
            health_score: 0,
        })
    }
}

/// Deterministic synthetic identity for a node that reported no key:
/// `invalid-` plus the first 16 hex chars of SHA-256 of the gossip address.
/// Stable across processes, so repeated sightings key the same row.
pub fn synthetic_key(gossip_address: &str) -> String {
    let digest = Sha256::digest(gossip_address.as_bytes());
    format!("invalid-{}", hex::encode(&digest[..8]))
}

/// Split `ip:port` into its parts; `None` demotes the entry to invalid.
fn split_address(address: &str) -> Option<(&str, u16)> {
    let (ip, port) = address.rsplit_once(':')?;
    if ip.is_empty() {
        return None;
    }
    let port: u16 = port.parse().ok()?;
    Some((ip, port))
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridpulse_state::StateStore;

    fn test_store() -> StateStore {
        StateStore::open_in_memory().unwrap()
    }

    fn no_geo() -> HashMap<String, GeoLocation> {
        HashMap::new()
    }

    fn valid_entry(pubkey: &str, address: &str) -> PolledEntry {
        PolledEntry {
            pubkey: Some(pubkey.to_string()),
            address: Some(address.to_string()),
            rpc_port: Some(8080),
            is_public: Some(true),
            version: Some("0.3.1".to_string()),
            storage_committed: Some(ByteCount::new(1_000_000)),
            storage_used: Some(ByteCount::new(250_000)),
            uptime_secs: Some(7200),
            last_seen_timestamp: Some(epoch_secs()),
        }
    }

    fn keyless_entry(address: &str) -> PolledEntry {
        PolledEntry {
            address: Some(address.to_string()),
            ..PolledEntry::default()
        }
    }

    #[test]
    fn partitions_valid_and_invalid() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        let snapshot = vec![
            valid_entry("key-1", "10.0.0.1:9001"),
            keyless_entry("10.0.0.2:9001"),
        ];
        let outcome = reconciler.reconcile(&snapshot, &no_geo()).unwrap();

        assert_eq!(outcome.valid.len(), 1);
        assert_eq!(outcome.invalid.len(), 1);
        assert_eq!(outcome.skipped, 0);

        let valid = store.get_pnode("key-1").unwrap().unwrap();
        assert_eq!(valid.ip_address, "10.0.0.1");
        assert_eq!(valid.gossip_port, 9001);
        assert_eq!(valid.status, NodeStatus::Online);
        assert!(valid.health_score >= 70);

        let invalid = &outcome.invalid[0];
        assert!(invalid.pubkey.starts_with("invalid-"));
        assert_eq!(invalid.status, NodeStatus::Invalid);
        assert_eq!(invalid.health_score, 0);
    }

    #[test]
    fn empty_snapshot_is_fatal_and_writes_nothing() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        let err = reconciler.reconcile(&[], &no_geo()).unwrap_err();
        assert!(matches!(err, ReconcileError::EmptyFleet));
        assert!(store.list_pnodes().unwrap().is_empty());
    }

    #[test]
    fn unparsable_address_demotes_to_invalid() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        // Has a key, but the address has no port.
        let mut entry = valid_entry("key-1", "10.0.0.1:9001");
        entry.address = Some("not-an-address".to_string());

        let outcome = reconciler.reconcile(&[entry], &no_geo()).unwrap();
        assert!(outcome.valid.is_empty());
        assert_eq!(outcome.invalid.len(), 1);
        // The real key is kept as the row identity.
        assert_eq!(outcome.invalid[0].pubkey, "key-1");
    }

    #[test]
    fn entry_with_nothing_to_key_by_is_skipped() {
        let reconciler = Reconciler::new(test_store());
        let snapshot = vec![PolledEntry::default(), valid_entry("key-1", "10.0.0.1:9001")];

        let outcome = reconciler.reconcile(&snapshot, &no_geo()).unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.valid.len(), 1);
    }

    #[test]
    fn identity_transition_replaces_invalid_row() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        // Cycle 1: the address reports no key and gets a synthetic identity.
        let outcome = reconciler
            .reconcile(&[keyless_entry("10.0.0.5:9001")], &no_geo())
            .unwrap();
        let synthetic = outcome.invalid[0].pubkey.clone();
        assert_eq!(synthetic, synthetic_key("10.0.0.5:9001"));

        // Cycle 2: the same address reports a real key.
        let outcome = reconciler
            .reconcile(&[valid_entry("key-real", "10.0.0.5:9001")], &no_geo())
            .unwrap();
        assert_eq!(outcome.transitions, 1);

        // Exactly one registry row for the address, keyed by the real key.
        assert!(store.get_pnode(&synthetic).unwrap().is_none());
        let row = store.find_pnode_by_address("10.0.0.5:9001").unwrap().unwrap();
        assert_eq!(row.pubkey, "key-real");
        assert_eq!(store.list_pnodes().unwrap().len(), 1);
    }

    #[test]
    fn repeated_invalid_sightings_reuse_the_synthetic_key() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        reconciler
            .reconcile(&[keyless_entry("10.0.0.5:9001")], &no_geo())
            .unwrap();
        reconciler
            .reconcile(&[keyless_entry("10.0.0.5:9001")], &no_geo())
            .unwrap();

        assert_eq!(store.list_pnodes().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_keys_in_batch_resolve_last_write_wins() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        let mut first = valid_entry("key-dup", "10.0.0.1:9001");
        first.storage_used = Some(ByteCount::new(100));
        let mut second = valid_entry("key-dup", "10.0.0.1:9001");
        second.storage_used = Some(ByteCount::new(900));

        let outcome = reconciler.reconcile(&[first, second], &no_geo()).unwrap();
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.valid.len(), 1);

        let row = store.get_pnode("key-dup").unwrap().unwrap();
        assert_eq!(row.storage_used, ByteCount::new(900));
    }

    #[test]
    fn geo_is_sticky_and_never_nulled() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        let berlin = GeoLocation {
            country: Some("Germany".to_string()),
            country_code: Some("DE".to_string()),
            city: Some("Berlin".to_string()),
            latitude: Some(52.52),
            longitude: Some(13.405),
        };
        let mut geo = HashMap::new();
        geo.insert("10.0.0.1:9001".to_string(), berlin.clone());

        reconciler
            .reconcile(&[valid_entry("key-1", "10.0.0.1:9001")], &geo)
            .unwrap();
        assert_eq!(store.get_pnode("key-1").unwrap().unwrap().geo, berlin);

        // Next cycle: no fresh enrichment — the location is carried forward.
        reconciler
            .reconcile(&[valid_entry("key-1", "10.0.0.1:9001")], &no_geo())
            .unwrap();
        assert_eq!(store.get_pnode("key-1").unwrap().unwrap().geo, berlin);

        // A failed lookup (all-null entry) does not erase it either.
        let mut failed = HashMap::new();
        failed.insert("10.0.0.1:9001".to_string(), GeoLocation::default());
        reconciler
            .reconcile(&[valid_entry("key-1", "10.0.0.1:9001")], &failed)
            .unwrap();
        assert_eq!(store.get_pnode("key-1").unwrap().unwrap().geo, berlin);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        let snapshot = vec![
            valid_entry("key-1", "10.0.0.1:9001"),
            valid_entry("key-2", "10.0.0.2:9001"),
            keyless_entry("10.0.0.3:9001"),
        ];
        reconciler.reconcile(&snapshot, &no_geo()).unwrap();
        reconciler.reconcile(&snapshot, &no_geo()).unwrap();

        assert_eq!(store.list_pnodes().unwrap().len(), 3);
    }

    #[test]
    fn first_seen_survives_later_cycles() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        reconciler
            .reconcile(&[valid_entry("key-1", "10.0.0.1:9001")], &no_geo())
            .unwrap();
        let first = store.get_pnode("key-1").unwrap().unwrap().first_seen_at;

        reconciler
            .reconcile(&[valid_entry("key-1", "10.0.0.1:9001")], &no_geo())
            .unwrap();
        let row = store.get_pnode("key-1").unwrap().unwrap();
        assert_eq!(row.first_seen_at, first);
        assert!(row.last_seen_at >= first);
    }

    #[test]
    fn stale_nodes_score_offline() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        let mut entry = valid_entry("key-stale", "10.0.0.1:9001");
        // Reported last seen two hours ago.
        entry.last_seen_timestamp = Some(epoch_secs() - 7200);

        reconciler.reconcile(&[entry], &no_geo()).unwrap();
        let row = store.get_pnode("key-stale").unwrap().unwrap();
        assert_eq!(row.health_score, 0);
        assert_eq!(row.status, NodeStatus::Offline);
    }

    #[test]
    fn version_is_truncated_and_carried_forward() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        let mut entry = valid_entry("key-1", "10.0.0.1:9001");
        entry.version = Some("v".repeat(100));
        reconciler.reconcile(&[entry], &no_geo()).unwrap();
        assert_eq!(store.get_pnode("key-1").unwrap().unwrap().version.len(), 32);

        // A later cycle without a version keeps the previous one.
        let mut entry = valid_entry("key-1", "10.0.0.1:9001");
        entry.version = None;
        reconciler.reconcile(&[entry], &no_geo()).unwrap();
        assert_eq!(store.get_pnode("key-1").unwrap().unwrap().version.len(), 32);
    }

    #[test]
    fn invalid_sighting_shadowed_by_valid_entry_same_batch() {
        let store = test_store();
        let reconciler = Reconciler::new(store.clone());

        let snapshot = vec![
            valid_entry("key-1", "10.0.0.1:9001"),
            keyless_entry("10.0.0.1:9001"),
        ];
        let outcome = reconciler.reconcile(&snapshot, &no_geo()).unwrap();

        assert_eq!(outcome.valid.len(), 1);
        assert!(outcome.invalid.is_empty());
        // One live row per address.
        assert_eq!(store.list_pnodes().unwrap().len(), 1);
    }

    #[test]
    fn synthetic_keys_are_stable() {
        assert_eq!(synthetic_key("10.0.0.1:9001"), synthetic_key("10.0.0.1:9001"));
        assert_ne!(synthetic_key("10.0.0.1:9001"), synthetic_key("10.0.0.2:9001"));
        assert_eq!(synthetic_key("a").len(), "invalid-".len() + 16);
    }
}
