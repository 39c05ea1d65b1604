//! Environment-supplied configuration.
//!
//! Everything is read from `GRIDPULSE_*` variables with workable defaults;
//! the CLI can override the data directory and intervals per invocation.

use std::path::PathBuf;
use std::time::Duration;

use gridpulse_collector::CollectorConfig;
use gridpulse_geo::GeoConfig;
use gridpulse_rpc::RpcConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub bootstrap_url: String,
    pub fallback_urls: Vec<String>,
    pub rpc_timeout_secs: u64,
    pub rpc_max_retries: u32,
    pub geo_api_url: String,
    pub geo_api_key: Option<String>,
    pub data_dir: PathBuf,
    pub basic_interval_secs: u64,
    pub detailed_interval_secs: u64,
    pub stats_retention_days: u64,
    pub node_retention_days: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            bootstrap_url: env_or("GRIDPULSE_BOOTSTRAP_URL", "http://127.0.0.1:8899"),
            fallback_urls: std::env::var("GRIDPULSE_FALLBACK_URLS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            rpc_timeout_secs: env_or("GRIDPULSE_RPC_TIMEOUT_SECS", "10").parse()?,
            rpc_max_retries: env_or("GRIDPULSE_RPC_MAX_RETRIES", "3").parse()?,
            geo_api_url: env_or("GRIDPULSE_GEO_API_URL", "https://ipapi.co"),
            geo_api_key: std::env::var("GRIDPULSE_GEO_API_KEY").ok().filter(|k| !k.is_empty()),
            data_dir: PathBuf::from(env_or("GRIDPULSE_DATA_DIR", "/var/lib/gridpulse")),
            basic_interval_secs: env_or("GRIDPULSE_BASIC_INTERVAL_SECS", "300").parse()?,
            detailed_interval_secs: env_or("GRIDPULSE_DETAILED_INTERVAL_SECS", "3600").parse()?,
            stats_retention_days: env_or("GRIDPULSE_STATS_RETENTION_DAYS", "30").parse()?,
            node_retention_days: env_or("GRIDPULSE_NODE_RETENTION_DAYS", "30").parse()?,
        })
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            bootstrap_url: self.bootstrap_url.clone(),
            fallback_urls: self.fallback_urls.clone(),
            timeout: Duration::from_secs(self.rpc_timeout_secs),
            max_retries: self.rpc_max_retries,
            ..RpcConfig::default()
        }
    }

    pub fn geo_config(&self) -> GeoConfig {
        GeoConfig {
            base_url: self.geo_api_url.clone(),
            api_key: self.geo_api_key.clone(),
            ..GeoConfig::default()
        }
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            stats_retention: Duration::from_secs(self.stats_retention_days * 24 * 3600),
            node_retention: Duration::from_secs(self.node_retention_days * 24 * 3600),
            ..CollectorConfig::default()
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        // Scoped to variables this test does not set.
        let config = Config::from_env().unwrap();
        assert_eq!(config.rpc_max_retries, 3);
        assert_eq!(config.basic_interval_secs, 300);
        assert_eq!(config.detailed_interval_secs, 3600);
        assert_eq!(config.stats_retention_days, 30);
    }

    #[test]
    fn fallback_urls_split_on_commas() {
        let urls: Vec<String> = "http://a:1, http://b:2 ,,"
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        assert_eq!(urls, vec!["http://a:1", "http://b:2"]);
    }
}
