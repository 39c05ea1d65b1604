//! The RPC client: retry, backoff, and failover over candidate URLs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RpcError, RpcResult};
use crate::wire::{methods, NodeMetrics, PolledEntry, Request, Response};

/// Client tuning knobs, environment-supplied by the daemon.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// First candidate for fleet-wide calls.
    pub bootstrap_url: String,
    /// Tried in order after the bootstrap URL is exhausted.
    pub fallback_urls: Vec<String>,
    /// Per-attempt timeout, enforced independently of backoff.
    pub timeout: Duration,
    /// Attempts per candidate URL.
    pub max_retries: u32,
    /// Backoff before attempt k+1 is `min(base_delay * 2^(k-1), max_delay)`.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bootstrap_url: "http://127.0.0.1:8899".to_string(),
            fallback_urls: Vec::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(8000),
        }
    }
}

/// Async JSON-RPC client for pNode endpoints.
pub struct RpcClient {
    http: reqwest::Client,
    config: RpcConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Build a client; the per-attempt timeout is baked into the HTTP client.
    pub fn new(config: RpcConfig) -> RpcResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RpcError::Client(e.to_string()))?;
        Ok(Self {
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Perform one JSON-RPC call.
    ///
    /// With an explicit `target` only that URL is tried; otherwise the
    /// bootstrap URL and then each fallback, in order. Every URL gets up to
    /// `max_retries` attempts with exponential backoff between them. The
    /// error surfaced after exhaustion is the last failure observed.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        target: Option<&str>,
    ) -> RpcResult<Value> {
        let candidates: Vec<&str> = match target {
            Some(url) => vec![url],
            None => std::iter::once(self.config.bootstrap_url.as_str())
                .chain(self.config.fallback_urls.iter().map(String::as_str))
                .collect(),
        };
        if candidates.is_empty() {
            return Err(RpcError::NoEndpoints);
        }

        let mut last_error: Option<RpcError> = None;
        for url in candidates {
            match self.call_url(url, method, &params).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(%url, method, error = %e, "rpc endpoint exhausted");
                    last_error = Some(e);
                }
            }
        }
        // `candidates` is non-empty, so an error was recorded.
        Err(RpcError::Exhausted(Box::new(
            last_error.unwrap_or(RpcError::NoEndpoints),
        )))
    }

    /// Retry loop against a single URL.
    async fn call_url(&self, url: &str, method: &str, params: &[Value]) -> RpcResult<Value> {
        let mut last_error = None;
        for attempt in 1..=self.config.max_retries.max(1) {
            match self.attempt(url, method, params).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    debug!(%url, method, attempt, error = %e, "rpc attempt failed");
                    last_error = Some(e);
                    if attempt < self.config.max_retries.max(1) {
                        tokio::time::sleep(backoff_delay(
                            attempt,
                            self.config.base_delay,
                            self.config.max_delay,
                        ))
                        .await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or(RpcError::NoEndpoints))
    }

    /// One request/response exchange.
    async fn attempt(&self, url: &str, method: &str, params: &[Value]) -> RpcResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(method, params, id);

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Response = response.json().await.map_err(|e| RpcError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if let Some(err) = body.error {
            return Err(RpcError::Rpc {
                url: url.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        body.result.ok_or_else(|| RpcError::EmptyResponse {
            url: url.to_string(),
        })
    }

    // ── Typed pipeline operations ──────────────────────────────────

    /// Fetch the full fleet snapshot with basic per-node metrics.
    pub async fn fetch_fleet_with_stats(&self) -> RpcResult<Vec<PolledEntry>> {
        let result = self.call(methods::FLEET_WITH_STATS, vec![], None).await?;
        self.decode_fleet(result)
    }

    /// Fetch the full fleet snapshot, identities and addresses only.
    pub async fn fetch_fleet_identities(&self) -> RpcResult<Vec<PolledEntry>> {
        let result = self.call(methods::FLEET_IDENTITIES, vec![], None).await?;
        self.decode_fleet(result)
    }

    /// Fetch one node's heavy metrics directly from its RPC endpoint.
    pub async fn fetch_node_metrics(&self, node_url: &str) -> RpcResult<NodeMetrics> {
        let result = self
            .call(methods::NODE_METRICS, vec![], Some(node_url))
            .await?;
        serde_json::from_value(result).map_err(|e| RpcError::Decode {
            url: node_url.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch one node's version string directly from its RPC endpoint.
    pub async fn fetch_node_version(&self, node_url: &str) -> RpcResult<String> {
        let result = self
            .call(methods::NODE_VERSION, vec![], Some(node_url))
            .await?;
        serde_json::from_value(result).map_err(|e| RpcError::Decode {
            url: node_url.to_string(),
            message: e.to_string(),
        })
    }

    /// A fleet result must be an array; entries inside it decode defensively.
    fn decode_fleet(&self, result: Value) -> RpcResult<Vec<PolledEntry>> {
        let Value::Array(raw) = result else {
            return Err(RpcError::Decode {
                url: self.config.bootstrap_url.clone(),
                message: "fleet snapshot is not an array".to_string(),
            });
        };
        Ok(raw.into_iter().map(PolledEntry::decode).collect())
    }
}

/// Backoff before attempt `attempt + 1`: `min(base * 2^(attempt-1), max)`.
fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
    base.saturating_mul(factor).min(max)
}

/// Build the RPC URL for a node's own endpoint.
pub fn node_rpc_url(ip: &str, rpc_port: u16) -> String {
    format!("http://{ip}:{rpc_port}")
}
