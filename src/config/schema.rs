//! Configuration schema for chartkit
//!
//! Configuration is stored at `~/.config/chartkit/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Artifact cache settings
    pub cache: CacheConfig,

    /// Registry client settings
    pub registry: RegistryConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Artifact cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries held at once
    pub max_items: usize,

    /// Default time-to-live for entries inserted without an explicit TTL
    pub ttl_secs: u64,

    /// Interval between background sweeps of expired entries
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: 1000,
            ttl_secs: 15 * 60,
            sweep_interval_secs: 60,
        }
    }
}

/// Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Upper bound for a single login exchange
    pub login_timeout_secs: u64,

    /// Talk to registries over plain HTTP instead of HTTPS
    pub plain_http: bool,

    /// Directory for temporary credentials files (defaults to the OS temp dir)
    pub temp_dir: Option<PathBuf>,

    /// Docker config.json used to resolve credentials not passed explicitly
    pub docker_config: Option<PathBuf>,
}

impl RegistryConfig {
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            login_timeout_secs: 30,
            plain_http: false,
            temp_dir: None,
            docker_config: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("[registry]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.max_items, 1000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(900));
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [cache]
            max_items = 16
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.max_items, 16);
        assert_eq!(config.cache.sweep_interval_secs, 60); // default preserved
        assert_eq!(config.registry.login_timeout(), Duration::from_secs(30));
    }
}
