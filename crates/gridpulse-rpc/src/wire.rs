//! Wire types for the pNode RPC protocol.
//!
//! The envelope is fixed for interoperability; result payloads are decoded
//! defensively with every field optional, so a node reporting garbage demotes
//! to an invalid sighting instead of failing the fleet call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gridpulse_state::ByteCount;

/// Method names consumed by the collection pipeline.
pub mod methods {
    /// Full fleet snapshot with basic per-node metrics.
    pub const FLEET_WITH_STATS: &str = "get-pods-with-stats";
    /// Full fleet snapshot, identity and address only.
    pub const FLEET_IDENTITIES: &str = "get-pods";
    /// One node's live heavy metrics.
    pub const NODE_METRICS: &str = "get-pod-metrics";
    /// One node's version string.
    pub const NODE_VERSION: &str = "get-version";
}

/// Request envelope: `{"jsonrpc":"2.0","method":…,"params":[…],"id":…}`.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: &'a [Value],
    pub id: u64,
}

impl<'a> Request<'a> {
    pub fn new(method: &'a str, params: &'a [Value], id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// Response envelope: exactly one of `result` / `error` is expected.
#[derive(Debug, Deserialize)]
pub struct Response {
    pub jsonrpc: Option<String>,
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

/// The `error` member of a response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// One fleet-snapshot entry as reported by the network.
///
/// Every field is optional: validation (and the valid/invalid partition)
/// happens in the reconciler, not here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolledEntry {
    pub pubkey: Option<String>,
    /// Gossip `ip:port` the node advertises.
    pub address: Option<String>,
    pub rpc_port: Option<u16>,
    pub is_public: Option<bool>,
    pub version: Option<String>,
    pub storage_committed: Option<ByteCount>,
    pub storage_used: Option<ByteCount>,
    pub uptime_secs: Option<u64>,
    /// Epoch seconds as reported by the node.
    pub last_seen_timestamp: Option<u64>,
}

impl PolledEntry {
    /// Decode one raw fleet element, falling back to the empty entry when the
    /// shape is unusable.
    pub fn decode(raw: Value) -> Self {
        serde_json::from_value(raw).unwrap_or_default()
    }
}

/// Heavy metrics returned by a node's detailed poll.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeMetrics {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope_shape() {
        let params = vec![json!("a")];
        let req = Request::new("get-pods", &params, 7);
        let encoded = serde_json::to_value(&req).unwrap();
        assert_eq!(
            encoded,
            json!({"jsonrpc": "2.0", "method": "get-pods", "params": ["a"], "id": 7})
        );
    }

    #[test]
    fn entry_decodes_camel_case_fields() {
        let entry = PolledEntry::decode(json!({
            "pubkey": "abc",
            "address": "10.0.0.1:9001",
            "rpcPort": 8080,
            "isPublic": true,
            "version": "0.3.1",
            "storageCommitted": "18446744073709551616",
            "storageUsed": 500,
            "uptimeSecs": 3600,
            "lastSeenTimestamp": 1700000000
        }));

        assert_eq!(entry.pubkey.as_deref(), Some("abc"));
        assert_eq!(entry.rpc_port, Some(8080));
        assert_eq!(entry.is_public, Some(true));
        // Above u64::MAX, decoded from the decimal string without loss.
        assert_eq!(
            entry.storage_committed,
            Some(ByteCount::new(18_446_744_073_709_551_616))
        );
        assert_eq!(entry.storage_used, Some(ByteCount::new(500)));
    }

    #[test]
    fn entry_tolerates_missing_fields() {
        let entry = PolledEntry::decode(json!({"address": "10.0.0.1:9001"}));
        assert_eq!(entry.address.as_deref(), Some("10.0.0.1:9001"));
        assert!(entry.pubkey.is_none());
        assert!(entry.storage_committed.is_none());
    }

    #[test]
    fn entry_demotes_on_wrong_types() {
        // A wrong-typed field poisons only this entry, and only to default.
        let entry = PolledEntry::decode(json!({"pubkey": 42, "address": "10.0.0.1:9001"}));
        assert_eq!(entry, PolledEntry::default());

        let entry = PolledEntry::decode(json!("not an object"));
        assert_eq!(entry, PolledEntry::default());
    }

    #[test]
    fn metrics_decode_partial_payload() {
        let metrics: NodeMetrics = serde_json::from_value(json!({
            "cpuPercent": 12.5,
            "ramUsed": 1024,
        }))
        .unwrap();
        assert_eq!(metrics.cpu_percent, Some(12.5));
        assert_eq!(metrics.ram_used, Some(1024));
        assert!(metrics.total_bytes.is_none());
    }
}
