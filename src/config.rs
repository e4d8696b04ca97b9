//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application name used for the default cache directory
const APP_NAME: &str = "portal-cache";

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix isolating this cache's keys inside the medium
    pub namespace: String,
    /// Default TTL in milliseconds for keys without a resource-specific TTL
    pub default_ttl_ms: u64,
    /// Envelope version; entries written under another version are evicted
    pub schema_version: u32,
    /// Delay before the first expired-entry sweep, in milliseconds
    pub sweep_delay_ms: u64,
    /// Interval between expired-entry sweeps, in seconds
    pub sweep_interval_secs: u64,
    /// Directory for the file-backed medium, None = platform cache dir
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAMESPACE` - Key prefix (default: `portal_cache_`)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in ms (default: 300000)
    /// - `CACHE_SCHEMA_VERSION` - Envelope version (default: 1)
    /// - `CACHE_SWEEP_DELAY_MS` - First sweep delay in ms (default: 5000)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Sweep frequency in seconds (default: 300)
    /// - `CACHE_DIR` - Directory for the file-backed medium
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.namespace),
            default_ttl_ms: parse_var("CACHE_DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            schema_version: parse_var("CACHE_SCHEMA_VERSION").unwrap_or(defaults.schema_version),
            sweep_delay_ms: parse_var("CACHE_SWEEP_DELAY_MS").unwrap_or(defaults.sweep_delay_ms),
            sweep_interval_secs: parse_var("CACHE_SWEEP_INTERVAL_SECS")
                .unwrap_or(defaults.sweep_interval_secs),
            cache_dir: env::var("CACHE_DIR").ok().map(PathBuf::from),
        }
    }

    /// Default TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Resolves the directory used by the file-backed medium.
    pub fn resolve_cache_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let base = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(base.join(APP_NAME))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "portal_cache_".to_string(),
            default_ttl_ms: 5 * 60 * 1000,
            schema_version: 1,
            sweep_delay_ms: 5000,
            sweep_interval_secs: 300,
            cache_dir: None,
        }
    }
}
