//! Pure fleet rollup arithmetic.
//!
//! Counts and storage totals cover every row the cycle touched; the heavy
//! aggregates cover only the subset of nodes that returned detailed stats
//! this cycle, so non-responders never dilute real averages with zeros.

use gridpulse_rpc::NodeMetrics;
use gridpulse_state::{ByteCount, Network, NetworkStats, NodeStatus, PNode};

/// Fold this cycle's registry rows into the network singleton.
///
/// Averages are taken over non-invalid rows only; invalid sightings report
/// no metrics and would drag every average toward zero.
pub fn network_rollup(nodes: &[PNode], now: u64) -> Network {
    let mut rollup = Network {
        total_nodes: nodes.len() as u32,
        online_nodes: 0,
        degraded_nodes: 0,
        offline_nodes: 0,
        invalid_nodes: 0,
        public_nodes: 0,
        private_nodes: 0,
        total_storage_committed: ByteCount::ZERO,
        total_storage_used: ByteCount::ZERO,
        avg_storage_usage_percent: 0.0,
        avg_uptime_secs: 0.0,
        avg_health_score: 0.0,
        detailed_stats_coverage: 0.0,
        updated_at: now,
    };

    let mut usage_sum = 0.0;
    let mut uptime_sum = 0.0;
    let mut health_sum = 0.0;
    let mut measured = 0u32;

    for node in nodes {
        match node.status {
            NodeStatus::Online => rollup.online_nodes += 1,
            NodeStatus::Degraded => rollup.degraded_nodes += 1,
            NodeStatus::Offline => rollup.offline_nodes += 1,
            NodeStatus::Invalid => rollup.invalid_nodes += 1,
        }
        if node.is_public {
            rollup.public_nodes += 1;
        } else {
            rollup.private_nodes += 1;
        }
        if node.status != NodeStatus::Invalid {
            rollup.total_storage_committed = rollup
                .total_storage_committed
                .saturating_add(node.storage_committed);
            rollup.total_storage_used =
                rollup.total_storage_used.saturating_add(node.storage_used);
            usage_sum += node.storage_usage_percent;
            uptime_sum += node.uptime_secs as f64;
            health_sum += node.health_score as f64;
            measured += 1;
        }
    }

    if measured > 0 {
        rollup.avg_storage_usage_percent = usage_sum / measured as f64;
        rollup.avg_uptime_secs = uptime_sum / measured as f64;
        rollup.avg_health_score = health_sum / measured as f64;
    }
    if rollup.total_nodes > 0 {
        rollup.detailed_stats_coverage =
            rollup.public_nodes as f64 / rollup.total_nodes as f64 * 100.0;
    }
    rollup
}

/// Fold the network rollup plus this cycle's detailed responses into a fleet
/// time-series row.
pub fn network_stats_rollup(
    network: &Network,
    epoch: u64,
    detailed: &[NodeMetrics],
    detailed_failed: u32,
) -> NetworkStats {
    let mut stats = NetworkStats {
        epoch,
        total_nodes: network.total_nodes,
        online_nodes: network.online_nodes,
        degraded_nodes: network.degraded_nodes,
        offline_nodes: network.offline_nodes,
        invalid_nodes: network.invalid_nodes,
        public_nodes: network.public_nodes,
        private_nodes: network.private_nodes,
        total_storage_committed: network.total_storage_committed,
        total_storage_used: network.total_storage_used,
        avg_storage_usage_percent: network.avg_storage_usage_percent,
        avg_uptime_secs: network.avg_uptime_secs,
        avg_health_score: network.avg_health_score,
        reporting_nodes: detailed.len() as u32,
        avg_cpu_percent: 0.0,
        total_ram_used: 0,
        total_ram_total: 0,
        total_active_streams: 0,
        total_packets_received: 0,
        total_packets_sent: 0,
        total_bytes: ByteCount::ZERO,
        total_pages: 0,
        detailed_success: detailed.len() as u32,
        detailed_failed,
        detailed_stats_coverage: network.detailed_stats_coverage,
    };

    let mut cpu_sum = 0.0;
    let mut cpu_samples = 0u32;
    for metrics in detailed {
        if let Some(cpu) = metrics.cpu_percent {
            cpu_sum += cpu;
            cpu_samples += 1;
        }
        stats.total_ram_used += metrics.ram_used.unwrap_or(0);
        stats.total_ram_total += metrics.ram_total.unwrap_or(0);
        stats.total_active_streams += metrics.active_streams.unwrap_or(0);
        stats.total_packets_received += metrics.packets_received.unwrap_or(0);
        stats.total_packets_sent += metrics.packets_sent.unwrap_or(0);
        stats.total_bytes = stats
            .total_bytes
            .saturating_add(metrics.total_bytes.unwrap_or(ByteCount::ZERO));
        stats.total_pages += metrics.total_pages.unwrap_or(0);
    }
    if cpu_samples > 0 {
        stats.avg_cpu_percent = cpu_sum / cpu_samples as f64;
    }
    stats
}
