//! The scoring function and its input shape.

use gridpulse_state::NodeStatus;

/// A node last seen at least this many minutes ago is considered offline.
///
/// This is the outermost recency band: beyond it the recency bonus is zero
/// anyway, so the window doubles as the online/offline boundary.
pub const ONLINE_WINDOW_MINUTES: u64 = 30;

/// Raw per-node vitals feeding one score computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeVitals {
    /// Derived from recency; when false the score is forced to 0.
    pub is_online: bool,
    /// 0–100.
    pub storage_usage_percent: f64,
    /// 0–100. Nodes that did not report CPU pass 0.
    pub cpu_percent: f64,
    pub uptime_secs: u64,
    /// Minutes since the node was last observed.
    pub last_seen_minutes: u64,
}

impl NodeVitals {
    /// Build vitals with `is_online` derived from [`ONLINE_WINDOW_MINUTES`].
    pub fn observed(
        storage_usage_percent: f64,
        cpu_percent: f64,
        uptime_secs: u64,
        last_seen_minutes: u64,
    ) -> Self {
        Self {
            is_online: last_seen_minutes < ONLINE_WINDOW_MINUTES,
            storage_usage_percent,
            cpu_percent,
            uptime_secs,
            last_seen_minutes,
        }
    }
}

/// Compute the 0–100 composite health score for one node.
///
/// Additive bands, each factor contributing its highest qualifying band.
pub fn score(vitals: &NodeVitals) -> u8 {
    if !vitals.is_online {
        return 0;
    }

    let mut total: i64 = 40;
    total += recency_bonus(vitals.last_seen_minutes);
    total += storage_health(vitals.storage_usage_percent);
    total += cpu_health(vitals.cpu_percent);
    total += uptime_bonus(vitals.uptime_secs);

    total.clamp(0, 100) as u8
}

/// Map a score onto the registry status classification.
pub fn status_for(score: u8) -> NodeStatus {
    match score {
        0 => NodeStatus::Offline,
        s if s >= 70 => NodeStatus::Online,
        _ => NodeStatus::Degraded,
    }
}

fn recency_bonus(last_seen_minutes: u64) -> i64 {
    match last_seen_minutes {
        0 => 20,
        1..5 => 15,
        5..10 => 10,
        10..30 => 5,
        _ => 0,
    }
}

fn storage_health(usage_percent: f64) -> i64 {
    if usage_percent == 0.0 {
        // A freshly committed node has served nothing yet.
        5
    } else if usage_percent <= 70.0 {
        15
    } else if usage_percent <= 85.0 {
        10
    } else if usage_percent <= 95.0 {
        5
    } else {
        0
    }
}

fn cpu_health(cpu_percent: f64) -> i64 {
    if cpu_percent <= 20.0 {
        10
    } else if cpu_percent <= 50.0 {
        7
    } else if cpu_percent <= 80.0 {
        4
    } else {
        1
    }
}

fn uptime_bonus(uptime_secs: u64) -> i64 {
    let hours = uptime_secs / 3600;
    match hours {
        h if h >= 168 => 15,
        h if h >= 72 => 12,
        h if h >= 24 => 9,
        h if h >= 6 => 6,
        h if h >= 1 => 3,
        _ => 0,
    }
}
