//! The enrichment service: cache, lookup, and batch fan-out.

use std::collections::HashMap;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, warn};

use gridpulse_state::GeoLocation;

use crate::error::{GeoError, GeoResult};

/// Tuning knobs for the enrichment service.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Lookup endpoint base, e.g. `https://ipapi.co`.
    pub base_url: String,
    /// Optional upstream API key, appended as a query parameter.
    pub api_key: Option<String>,
    /// Cache entries expire after this window.
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    /// Addresses per concurrent chunk in [`GeoService::resolve_many`].
    pub batch_size: usize,
    /// Pause between chunks, for upstream rate limits.
    pub batch_delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ipapi.co".to_string(),
            api_key: None,
            cache_ttl: Duration::from_secs(7 * 24 * 3600),
            cache_capacity: 10_000,
            batch_size: 5,
            batch_delay: Duration::from_millis(800),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Raw lookup API payload; any field may be absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LookupResponse {
    error: Option<bool>,
    reason: Option<String>,
    city: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// TTL-cached, rate-limited IP location resolver.
///
/// The cache is owned by the service instance, keyed by the port-stripped
/// IP, so two nodes on one host share a single upstream lookup.
pub struct GeoService {
    http: reqwest::Client,
    cache: Cache<String, GeoLocation>,
    config: GeoConfig,
}

impl GeoService {
    pub fn new(config: GeoConfig) -> GeoResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeoError::Client(e.to_string()))?;
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(config.cache_ttl)
            .build();
        Ok(Self {
            http,
            cache,
            config,
        })
    }

    /// Resolve one address to a location.
    ///
    /// Cache hits return immediately. On miss the upstream API is consulted;
    /// a failed lookup yields the all-null location and is not cached, so it
    /// will be retried on the next eligible cycle.
    pub async fn resolve(&self, address: &str) -> GeoLocation {
        let ip = strip_port(address).to_string();

        if let Some(cached) = self.cache.get(&ip).await {
            debug!(%ip, "geo cache hit");
            return cached;
        }

        match self.lookup(&ip).await {
            Ok(geo) => {
                if geo.is_empty() {
                    // Upstream answered 2xx but resolved nothing usable;
                    // treat like a failure so it can be retried.
                    warn!(%ip, "geo lookup resolved no fields");
                    return geo;
                }
                if !geo.is_complete() {
                    warn!(%ip, ?geo, "geo lookup returned a partial location");
                }
                self.cache.insert(ip, geo.clone()).await;
                geo
            }
            Err(e) => {
                warn!(%ip, error = %e, "geo lookup failed");
                GeoLocation::default()
            }
        }
    }

    /// Resolve many addresses, keyed by the address as given.
    ///
    /// Processes fixed-size chunks concurrently with an inter-chunk pause;
    /// per-address failures yield all-null entries without aborting the rest.
    pub async fn resolve_many(&self, addresses: &[String]) -> HashMap<String, GeoLocation> {
        let mut resolved = HashMap::with_capacity(addresses.len());
        let chunk_size = self.config.batch_size.max(1);
        let chunks: Vec<&[String]> = addresses.chunks(chunk_size).collect();
        let total = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            let lookups = chunk.iter().map(|addr| async {
                let geo = self.resolve(addr).await;
                (addr.clone(), geo)
            });
            for (addr, geo) in futures::future::join_all(lookups).await {
                resolved.insert(addr, geo);
            }
            if i + 1 < total {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }
        resolved
    }

    /// Entries currently cached (for diagnostics).
    pub async fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// One upstream exchange.
    async fn lookup(&self, ip: &str) -> GeoResult<GeoLocation> {
        let mut url = format!("{}/{}/json/", self.config.base_url.trim_end_matches('/'), ip);
        if let Some(key) = &self.config.api_key {
            url.push_str("?key=");
            url.push_str(key);
        }

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GeoError::Transport {
                ip: ip.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status {
                ip: ip.to_string(),
                status: status.as_u16(),
            });
        }

        let body: LookupResponse = response.json().await.map_err(|e| GeoError::Decode {
            ip: ip.to_string(),
            message: e.to_string(),
        })?;

        if body.error.unwrap_or(false) {
            return Err(GeoError::Rejected {
                ip: ip.to_string(),
                reason: body.reason.unwrap_or_else(|| "unspecified".to_string()),
            });
        }

        Ok(GeoLocation {
            country: body.country_name,
            country_code: body.country_code,
            city: body.city,
            latitude: body.latitude,
            longitude: body.longitude,
        })
    }
}

/// Strip a trailing `:port` from an address, leaving bare IPs untouched.
fn strip_port(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some((ip, _)) = rest.split_once(']') {
            return ip;
        }
    }
    match address.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host
        }
        _ => address,
    }
}
