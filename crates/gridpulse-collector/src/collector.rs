//! The collector: cycle orchestration, patching, and pruning.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use gridpulse_geo::GeoService;
use gridpulse_registry::Reconciler;
use gridpulse_rpc::{node_rpc_url, NodeMetrics, PolledEntry, RpcClient};
use gridpulse_state::{
    truncate_version, Network, NodeStatus, PNode, PNodeStats, StateStore,
};

use crate::aggregate::{network_rollup, network_stats_rollup};
use crate::error::CollectResult;

/// Tuning knobs for the collection cycles.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Concurrent per-node detail calls per batch.
    pub detail_batch_size: usize,
    /// Time-series rows older than this are pruned.
    pub stats_retention: Duration,
    /// Registry rows unobserved for this long are dropped.
    pub node_retention: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            detail_batch_size: 10,
            stats_retention: Duration::from_secs(30 * 24 * 3600),
            node_retention: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

/// Structured result of a basic cycle, returned to the scheduler/operator.
#[derive(Debug, Clone, Serialize)]
pub struct BasicCycleSummary {
    pub success: bool,
    /// Collection window start (epoch seconds, minute-bucketed).
    pub epoch: u64,
    pub duration_ms: u64,
    pub total_polled: u32,
    pub valid_nodes: u32,
    pub invalid_nodes: u32,
    pub public_nodes: u32,
    pub private_nodes: u32,
    pub identity_transitions: u32,
    pub geo_lookups: u32,
}

/// Structured result of a detailed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedCycleSummary {
    #[serde(flatten)]
    pub basic: BasicCycleSummary,
    pub detailed_eligible: u32,
    pub detailed_success: u32,
    pub detailed_failed: u32,
    pub detailed_stats_coverage: f64,
}

/// Result of a retention pass.
#[derive(Debug, Clone, Serialize)]
pub struct PruneSummary {
    pub pnode_stats_removed: u32,
    pub network_stats_removed: u32,
    pub nodes_removed: u32,
}

/// Everything the detailed cycle needs from the basic pass it runs first.
struct BasicRun {
    summary: BasicCycleSummary,
    valid: Vec<PNode>,
    network: Network,
}

/// Drives the two collection cadences over the shared components.
pub struct Collector {
    store: StateStore,
    rpc: RpcClient,
    geo: GeoService,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(store: StateStore, rpc: RpcClient, geo: GeoService) -> Self {
        Self {
            store,
            rpc,
            geo,
            config: CollectorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one basic cycle at the current minute bucket.
    pub async fn run_basic_cycle(&self) -> CollectResult<BasicCycleSummary> {
        self.run_basic_cycle_at(bucket_epoch(epoch_secs())).await
    }

    /// Run one basic cycle against an explicit collection window.
    pub async fn run_basic_cycle_at(&self, epoch: u64) -> CollectResult<BasicCycleSummary> {
        Ok(self.basic_at(epoch).await?.summary)
    }

    /// Run one detailed cycle at the current minute bucket.
    pub async fn run_detailed_cycle(&self) -> CollectResult<DetailedCycleSummary> {
        self.run_detailed_cycle_at(bucket_epoch(epoch_secs())).await
    }

    /// Run one detailed cycle against an explicit collection window.
    ///
    /// Performs the basic cycle's work first, then fans out per-node detail
    /// calls to every public, online node in bounded-concurrency batches.
    /// Per-node failures are counted, never fatal.
    pub async fn run_detailed_cycle_at(&self, epoch: u64) -> CollectResult<DetailedCycleSummary> {
        let run = self.basic_at(epoch).await?;

        let eligible: Vec<&PNode> = run
            .valid
            .iter()
            .filter(|n| n.is_public && n.status == NodeStatus::Online && n.rpc_port > 0)
            .collect();

        let mut collected: Vec<NodeMetrics> = Vec::new();
        let mut failed = 0u32;

        for chunk in eligible.chunks(self.config.detail_batch_size.max(1)) {
            let calls = chunk.iter().map(|node| {
                let node = *node;
                async move {
                    let url = node_rpc_url(&node.ip_address, node.rpc_port);
                    (node, self.rpc.fetch_node_metrics(&url).await)
                }
            });
            for (node, result) in join_all(calls).await {
                match result {
                    Ok(metrics) => {
                        self.patch_stats(node, epoch, &metrics)?;
                        self.refresh_version_if_missing(node).await;
                        collected.push(metrics);
                    }
                    Err(e) => {
                        failed += 1;
                        warn!(
                            pubkey = %node.pubkey,
                            address = %node.gossip_address,
                            error = %e,
                            "detailed poll failed"
                        );
                    }
                }
            }
        }

        let stats = network_stats_rollup(&run.network, epoch, &collected, failed);
        self.store.put_network_stats(&stats)?;

        let summary = DetailedCycleSummary {
            detailed_eligible: eligible.len() as u32,
            detailed_success: collected.len() as u32,
            detailed_failed: failed,
            detailed_stats_coverage: run.network.detailed_stats_coverage,
            basic: run.summary,
        };
        info!(
            epoch,
            eligible = summary.detailed_eligible,
            success = summary.detailed_success,
            failed = summary.detailed_failed,
            coverage = summary.detailed_stats_coverage,
            "detailed cycle complete"
        );
        Ok(summary)
    }

    /// Drop time-series rows and unobserved registry rows past retention.
    pub async fn prune(&self) -> CollectResult<PruneSummary> {
        let now = epoch_secs();
        let stats_cutoff = now.saturating_sub(self.config.stats_retention.as_secs());
        let node_cutoff = now.saturating_sub(self.config.node_retention.as_secs());

        let pnode_stats_removed = self.store.prune_pnode_stats_before(stats_cutoff)?;
        let network_stats_removed = self.store.prune_network_stats_before(stats_cutoff)?;
        let removed = self.store.prune_pnodes_unseen_since(node_cutoff)?;

        let summary = PruneSummary {
            pnode_stats_removed,
            network_stats_removed,
            nodes_removed: removed.len() as u32,
        };
        info!(
            stats_rows = summary.pnode_stats_removed,
            network_rows = summary.network_stats_removed,
            nodes = summary.nodes_removed,
            "retention prune complete"
        );
        Ok(summary)
    }

    /// The shared basic pass: poll, enrich, reconcile, persist, roll up.
    async fn basic_at(&self, epoch: u64) -> CollectResult<BasicRun> {
        let started = Instant::now();
        let snapshot = self.rpc.fetch_fleet_with_stats().await?;
        debug!(entries = snapshot.len(), "fleet snapshot fetched");

        let candidates = self.geo_candidates(&snapshot)?;
        let geo = self.geo.resolve_many(&candidates).await;

        let outcome = Reconciler::new(self.store.clone()).reconcile(&snapshot, &geo)?;

        for node in &outcome.valid {
            self.upsert_basic_stats(node, epoch)?;
        }

        let fleet: Vec<PNode> = outcome
            .valid
            .iter()
            .chain(outcome.invalid.iter())
            .cloned()
            .collect();
        let network = network_rollup(&fleet, epoch_secs());
        self.store.put_network(&network)?;

        let summary = BasicCycleSummary {
            success: true,
            epoch,
            duration_ms: started.elapsed().as_millis() as u64,
            total_polled: snapshot.len() as u32,
            valid_nodes: outcome.valid.len() as u32,
            invalid_nodes: outcome.invalid.len() as u32,
            public_nodes: network.public_nodes,
            private_nodes: network.private_nodes,
            identity_transitions: outcome.transitions,
            geo_lookups: candidates.len() as u32,
        };
        info!(
            epoch,
            polled = summary.total_polled,
            valid = summary.valid_nodes,
            invalid = summary.invalid_nodes,
            geo_lookups = summary.geo_lookups,
            "basic cycle complete"
        );
        Ok(BasicRun {
            summary,
            valid: outcome.valid,
            network,
        })
    }

    /// Addresses needing enrichment this cycle: new nodes, incomplete
    /// locations, and changed IPs. Complete existing data is never refetched.
    fn geo_candidates(&self, snapshot: &[PolledEntry]) -> CollectResult<Vec<String>> {
        let known = self.store.list_pnodes()?;
        let by_pubkey: HashMap<&str, &PNode> =
            known.iter().map(|n| (n.pubkey.as_str(), n)).collect();

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for entry in snapshot {
            let (Some(key), Some(addr)) = (entry.pubkey.as_deref(), entry.address.as_deref())
            else {
                continue;
            };
            if key.is_empty() || addr.is_empty() {
                continue;
            }
            let ip = addr.rsplit_once(':').map(|(ip, _)| ip).unwrap_or(addr);
            let needed = match by_pubkey.get(key) {
                None => true,
                Some(existing) => !existing.geo.is_complete() || existing.ip_address != ip,
            };
            if needed && seen.insert(addr.to_string()) {
                candidates.push(addr.to_string());
            }
        }
        Ok(candidates)
    }

    /// Upsert the basic time-series row for one node at this epoch.
    ///
    /// Heavy fields already patched into an existing row for the same window
    /// are carried forward, so re-running the basic pass never nulls them.
    fn upsert_basic_stats(&self, node: &PNode, epoch: u64) -> CollectResult<()> {
        let previous = self.store.get_pnode_stats(&node.pubkey, epoch)?;
        let mut stats = PNodeStats {
            pubkey: node.pubkey.clone(),
            epoch,
            storage_committed: node.storage_committed,
            storage_used: node.storage_used,
            storage_usage_percent: node.storage_usage_percent,
            uptime_secs: node.uptime_secs,
            health_score: node.health_score,
            status: node.status,
            cpu_percent: None,
            ram_used: None,
            ram_total: None,
            active_streams: None,
            packets_received: None,
            packets_sent: None,
            total_bytes: None,
            total_pages: None,
            current_index: None,
        };
        if let Some(prev) = previous {
            stats.cpu_percent = prev.cpu_percent;
            stats.ram_used = prev.ram_used;
            stats.ram_total = prev.ram_total;
            stats.active_streams = prev.active_streams;
            stats.packets_received = prev.packets_received;
            stats.packets_sent = prev.packets_sent;
            stats.total_bytes = prev.total_bytes;
            stats.total_pages = prev.total_pages;
            stats.current_index = prev.current_index;
        }
        self.store.put_pnode_stats(&stats)?;
        Ok(())
    }

    /// Patch the already-inserted row for this window with heavy metrics.
    fn patch_stats(&self, node: &PNode, epoch: u64, metrics: &NodeMetrics) -> CollectResult<()> {
        let Some(mut stats) = self.store.get_pnode_stats(&node.pubkey, epoch)? else {
            warn!(pubkey = %node.pubkey, epoch, "no basic row to patch, skipping");
            return Ok(());
        };
        stats.cpu_percent = metrics.cpu_percent;
        stats.ram_used = metrics.ram_used;
        stats.ram_total = metrics.ram_total;
        stats.active_streams = metrics.active_streams;
        stats.packets_received = metrics.packets_received;
        stats.packets_sent = metrics.packets_sent;
        stats.total_bytes = metrics.total_bytes;
        stats.total_pages = metrics.total_pages;
        stats.current_index = metrics.current_index;
        self.store.put_pnode_stats(&stats)?;
        Ok(())
    }

    /// Fetch the version string for a node whose row carries none yet.
    /// Best-effort: failures are logged and ignored.
    async fn refresh_version_if_missing(&self, node: &PNode) {
        if !node.version.is_empty() {
            return;
        }
        let url = node_rpc_url(&node.ip_address, node.rpc_port);
        match self.rpc.fetch_node_version(&url).await {
            Ok(version) => {
                let result = self.store.get_pnode(&node.pubkey).and_then(|row| match row {
                    Some(mut row) => {
                        row.version = truncate_version(&version);
                        self.store.put_pnode(&row)
                    }
                    None => Ok(()),
                });
                if let Err(e) = result {
                    warn!(pubkey = %node.pubkey, error = %e, "version refresh write failed");
                }
            }
            Err(e) => debug!(pubkey = %node.pubkey, error = %e, "version fetch failed"),
        }
    }
}

/// Round an epoch down to its minute bucket.
fn bucket_epoch(now: u64) -> u64 {
    now - now % 60
}

fn epoch_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridpulse_geo::GeoConfig;
    use gridpulse_rpc::RpcConfig;
    use gridpulse_state::ByteCount;
    use httpmock::prelude::*;
    use serde_json::{json, Value};

    /// A minute-bucketed window near the present, so retention cutoffs
    /// computed from the wall clock never catch this cycle's rows.
    fn test_epoch() -> u64 {
        bucket_epoch(epoch_secs())
    }

    fn fleet_entry(pubkey: &str, address: &str, rpc_port: u16, is_public: bool) -> Value {
        json!({
            "pubkey": pubkey,
            "address": address,
            "rpcPort": rpc_port,
            "isPublic": is_public,
            "version": "0.3.1",
            "storageCommitted": "1000000",
            "storageUsed": "250000",
            "uptimeSecs": 7200,
            "lastSeenTimestamp": epoch_secs(),
        })
    }

    fn keyless_entry(address: &str) -> Value {
        json!({"address": address})
    }

    async fn mock_fleet(server: &MockServer, entries: Vec<Value>) {
        server
            .mock_async(move |when, then| {
                when.method(POST)
                    .path("/")
                    .json_body_partial(r#"{"method": "get-pods-with-stats"}"#);
                then.status(200)
                    .json_body(json!({"jsonrpc": "2.0", "id": 1, "result": entries}));
            })
            .await;
    }

    async fn mock_geo<'a>(server: &'a MockServer, ip: &str) -> httpmock::Mock<'a> {
        let path = format!("/{ip}/json/");
        server
            .mock_async(move |when, then| {
                when.method(GET).path(path);
                then.status(200).json_body(json!({
                    "city": "Berlin",
                    "country_name": "Germany",
                    "country_code": "DE",
                    "latitude": 52.52,
                    "longitude": 13.405
                }));
            })
            .await
    }

    async fn mock_node_metrics(server: &MockServer, cpu: f64) {
        server
            .mock_async(move |when, then| {
                when.method(POST)
                    .path("/")
                    .json_body_partial(r#"{"method": "get-pod-metrics"}"#);
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0", "id": 1,
                    "result": {
                        "cpuPercent": cpu,
                        "ramUsed": 1024,
                        "ramTotal": 4096,
                        "activeStreams": 3,
                        "packetsReceived": 500,
                        "packetsSent": 400,
                        "totalBytes": "9000000000000000000000",
                        "totalPages": 12,
                        "currentIndex": 7
                    }
                }));
            })
            .await;
    }

    fn collector(fleet: &MockServer, geo: &MockServer, store: StateStore) -> Collector {
        let rpc = RpcClient::new(RpcConfig {
            bootstrap_url: fleet.url("/"),
            fallback_urls: Vec::new(),
            timeout: Duration::from_secs(2),
            max_retries: 1,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
        })
        .unwrap();
        let geo = GeoService::new(GeoConfig {
            base_url: geo.base_url(),
            batch_delay: Duration::from_millis(5),
            ..GeoConfig::default()
        })
        .unwrap();
        Collector::new(store, rpc, geo)
    }

    #[tokio::test]
    async fn basic_cycle_persists_registry_stats_and_network() {
        let epoch = test_epoch();
        let fleet = MockServer::start_async().await;
        let geo = MockServer::start_async().await;
        mock_fleet(
            &fleet,
            vec![
                fleet_entry("key-1", "10.0.0.1:9001", 8080, true),
                fleet_entry("key-2", "10.0.0.2:9001", 8080, false),
                keyless_entry("10.0.0.3:9001"),
            ],
        )
        .await;
        mock_geo(&geo, "10.0.0.1").await;
        mock_geo(&geo, "10.0.0.2").await;

        let store = StateStore::open_in_memory().unwrap();
        let collector = collector(&fleet, &geo, store.clone());
        let summary = collector.run_basic_cycle_at(epoch).await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.epoch, epoch);
        assert_eq!(summary.total_polled, 3);
        assert_eq!(summary.valid_nodes, 2);
        assert_eq!(summary.invalid_nodes, 1);
        assert_eq!(summary.geo_lookups, 2);

        // Registry rows, enriched.
        assert_eq!(store.list_pnodes().unwrap().len(), 3);
        let node = store.get_pnode("key-1").unwrap().unwrap();
        assert_eq!(node.geo.city.as_deref(), Some("Berlin"));
        assert_eq!(node.status, NodeStatus::Online);

        // Basic time-series rows with heavy fields unset.
        let row = store.get_pnode_stats("key-1", epoch).unwrap().unwrap();
        assert!(row.cpu_percent.is_none());
        assert_eq!(row.storage_used, ByteCount::new(250_000));
        // No row for the invalid sighting.
        assert!(store
            .list_pnode_stats(&gridpulse_registry::synthetic_key("10.0.0.3:9001"), 10)
            .unwrap()
            .is_empty());

        // Network singleton.
        let network = store.get_network().unwrap().unwrap();
        assert_eq!(network.total_nodes, 3);
        assert_eq!(network.invalid_nodes, 1);
        assert_eq!(network.public_nodes, 1);
        assert_eq!(network.private_nodes, 2);
    }

    #[tokio::test]
    async fn basic_cycle_is_idempotent_and_geo_is_not_refetched() {
        let epoch = test_epoch();
        let fleet = MockServer::start_async().await;
        let geo = MockServer::start_async().await;
        mock_fleet(
            &fleet,
            vec![fleet_entry("key-1", "10.0.0.1:9001", 8080, true)],
        )
        .await;
        let geo_mock = mock_geo(&geo, "10.0.0.1").await;

        let store = StateStore::open_in_memory().unwrap();
        let collector = collector(&fleet, &geo, store.clone());

        collector.run_basic_cycle_at(epoch).await.unwrap();
        let second = collector.run_basic_cycle_at(epoch).await.unwrap();

        // No duplicate registry or time-series rows.
        assert_eq!(store.list_pnodes().unwrap().len(), 1);
        assert_eq!(store.list_pnode_stats("key-1", 10).unwrap().len(), 1);

        // The location was complete after the first cycle, so the second
        // cycle schedules no lookups at all.
        assert_eq!(second.geo_lookups, 0);
        assert_eq!(geo_mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn empty_fleet_aborts_before_any_write() {
        let epoch = test_epoch();
        let fleet = MockServer::start_async().await;
        let geo = MockServer::start_async().await;
        mock_fleet(&fleet, vec![]).await;

        let store = StateStore::open_in_memory().unwrap();
        let collector = collector(&fleet, &geo, store.clone());

        let err = collector.run_basic_cycle_at(epoch).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::CollectError::Reconcile(
                gridpulse_registry::ReconcileError::EmptyFleet
            )
        ));
        assert!(store.list_pnodes().unwrap().is_empty());
        assert!(store.get_network().unwrap().is_none());
    }

    #[tokio::test]
    async fn detailed_cycle_patches_responders_and_counts_failures() {
        let epoch = test_epoch();
        let fleet = MockServer::start_async().await;
        let geo = MockServer::start_async().await;
        let node_a = MockServer::start_async().await;
        let node_b = MockServer::start_async().await;
        let node_down = MockServer::start_async().await;

        mock_fleet(
            &fleet,
            vec![
                fleet_entry("key-a", "127.0.0.1:9001", node_a.port(), true),
                fleet_entry("key-b", "127.0.0.1:9002", node_b.port(), true),
                fleet_entry("key-down", "127.0.0.1:9003", node_down.port(), true),
                fleet_entry("key-private", "127.0.0.1:9004", 8080, false),
            ],
        )
        .await;
        mock_geo(&geo, "127.0.0.1").await;
        mock_node_metrics(&node_a, 10.0).await;
        mock_node_metrics(&node_b, 30.0).await;
        node_down
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(500);
            })
            .await;

        let store = StateStore::open_in_memory().unwrap();
        let collector = collector(&fleet, &geo, store.clone());
        let summary = collector.run_detailed_cycle_at(epoch).await.unwrap();

        // Only public + online nodes are eligible; the private node is not.
        assert_eq!(summary.detailed_eligible, 3);
        assert_eq!(summary.detailed_success, 2);
        assert_eq!(summary.detailed_failed, 1);

        // Responders got their rows patched in place.
        let row = store.get_pnode_stats("key-a", epoch).unwrap().unwrap();
        assert_eq!(row.cpu_percent, Some(10.0));
        assert_eq!(
            row.total_bytes,
            Some(ByteCount::new(9_000_000_000_000_000_000_000))
        );
        // The failed node keeps its basic row, heavy fields still unset.
        let row = store.get_pnode_stats("key-down", epoch).unwrap().unwrap();
        assert!(row.cpu_percent.is_none());
        // Still exactly one row per node for the window.
        assert_eq!(store.list_pnode_stats("key-a", 10).unwrap().len(), 1);

        // Fleet row aggregates the responder subset only.
        let all = store.list_network_stats().unwrap();
        assert_eq!(all.len(), 1);
        let stats = &all[0];
        assert_eq!(stats.reporting_nodes, 2);
        assert!((stats.avg_cpu_percent - 20.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_ram_used, 2048);
        assert_eq!(
            stats.total_bytes,
            ByteCount::new(18_000_000_000_000_000_000_000)
        );
        // Coverage reflects public/total, independent of the failure.
        assert!((stats.detailed_stats_coverage - 75.0).abs() < f64::EPSILON);
        assert_eq!(stats.detailed_failed, 1);
    }

    #[tokio::test]
    async fn detailed_cycle_refreshes_missing_versions() {
        let epoch = test_epoch();
        let fleet = MockServer::start_async().await;
        let geo = MockServer::start_async().await;
        let node = MockServer::start_async().await;

        let mut entry = fleet_entry("key-1", "127.0.0.1:9001", node.port(), true);
        entry.as_object_mut().unwrap().remove("version");
        mock_fleet(&fleet, vec![entry]).await;
        mock_geo(&geo, "127.0.0.1").await;
        mock_node_metrics(&node, 5.0).await;
        node.mock_async(|when, then| {
            when.method(POST)
                .path("/")
                .json_body_partial(r#"{"method": "get-version"}"#);
            then.status(200)
                .json_body(json!({"jsonrpc": "2.0", "id": 1, "result": "0.4.0"}));
        })
        .await;

        let store = StateStore::open_in_memory().unwrap();
        let collector = collector(&fleet, &geo, store.clone());
        collector.run_detailed_cycle_at(epoch).await.unwrap();

        let row = store.get_pnode("key-1").unwrap().unwrap();
        assert_eq!(row.version, "0.4.0");
    }

    #[tokio::test]
    async fn prune_drops_expired_rows_and_stale_nodes() {
        let epoch = test_epoch();
        let fleet = MockServer::start_async().await;
        let geo = MockServer::start_async().await;
        mock_fleet(
            &fleet,
            vec![fleet_entry("key-live", "10.0.0.1:9001", 8080, true)],
        )
        .await;
        mock_geo(&geo, "10.0.0.1").await;

        let store = StateStore::open_in_memory().unwrap();
        let collector = collector(&fleet, &geo, store.clone());

        let fresh = collector.run_basic_cycle_at(epoch).await.unwrap();
        assert!(fresh.success);

        // Seed ancient rows well past any retention window.
        let mut old_node = store.get_pnode("key-live").unwrap().unwrap();
        old_node.pubkey = "key-stale".to_string();
        old_node.gossip_address = "10.0.0.9:9001".to_string();
        old_node.last_seen_at = 1000;
        store.put_pnode(&old_node).unwrap();
        let mut old_stats = store.get_pnode_stats("key-live", epoch).unwrap().unwrap();
        old_stats.pubkey = "key-stale".to_string();
        old_stats.epoch = 1000;
        store.put_pnode_stats(&old_stats).unwrap();

        let summary = collector.prune().await.unwrap();
        assert_eq!(summary.nodes_removed, 1);
        assert_eq!(summary.pnode_stats_removed, 1);

        assert!(store.get_pnode("key-stale").unwrap().is_none());
        assert!(store.get_pnode("key-live").unwrap().is_some());
    }

    #[test]
    fn epoch_bucketing_rounds_down_to_the_minute() {
        assert_eq!(bucket_epoch(1_700_000_059), 1_700_000_040);
        assert_eq!(bucket_epoch(1_700_000_040), 1_700_000_040);
        assert_eq!(bucket_epoch(59), 0);
    }
}
