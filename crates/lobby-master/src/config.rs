//! Master server configuration.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use lobby_core::LobbyError;

/// Tunables for a master server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterConfig {
    /// How often a silent server is probed (milliseconds).
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_ms: u64,

    /// Consecutive unanswered probes before a server is dropped.
    #[serde(default = "default_missed_ping_limit")]
    pub missed_ping_limit: u32,

    /// Connection age before flood checks apply (milliseconds).
    #[serde(default = "default_flood_check_delay")]
    pub flood_check_delay_ms: u64,

    /// Average inbound bytes per millisecond above which a peer is banned.
    #[serde(default = "default_flood_bytes_per_ms")]
    pub flood_bytes_per_ms: f64,

    /// Queries accepted per second from one IP (unlimited when unset).
    #[serde(default)]
    pub query_quota_per_second: Option<NonZeroU32>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval_ms: default_keep_alive_interval(),
            missed_ping_limit: default_missed_ping_limit(),
            flood_check_delay_ms: default_flood_check_delay(),
            flood_bytes_per_ms: default_flood_bytes_per_ms(),
            query_quota_per_second: None,
        }
    }
}

impl MasterConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> lobby_core::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| LobbyError::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Keep-alive interval as a `Duration`
    #[must_use]
    pub const fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    /// Flood check delay as a `Duration`
    #[must_use]
    pub const fn flood_check_delay(&self) -> Duration {
        Duration::from_millis(self.flood_check_delay_ms)
    }
}

// Default value functions for serde.
const fn default_keep_alive_interval() -> u64 {
    20_000
}

const fn default_missed_ping_limit() -> u32 {
    4
}

const fn default_flood_check_delay() -> u64 {
    5_000
}

const fn default_flood_bytes_per_ms() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MasterConfig::default();
        assert_eq!(config.keep_alive_interval(), Duration::from_secs(20));
        assert_eq!(config.missed_ping_limit, 4);
        assert_eq!(config.flood_check_delay(), Duration::from_secs(5));
        assert!((config.flood_bytes_per_ms - 2.0).abs() < f64::EPSILON);
        assert!(config.query_quota_per_second.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = MasterConfig {
            query_quota_per_second: NonZeroU32::new(5),
            ..MasterConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MasterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let path = Path::new("/tmp/nonexistent_lobby_master_config.toml");
        let config = MasterConfig::load(path).unwrap();
        assert_eq!(config, MasterConfig::default());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmpfile,
            "keep_alive_interval_ms = 1000\nmissed_ping_limit = 2\nquery_quota_per_second = 10\n"
        )
        .unwrap();

        let config = MasterConfig::load(tmpfile.path()).unwrap();
        assert_eq!(config.keep_alive_interval_ms, 1000);
        assert_eq!(config.missed_ping_limit, 2);
        assert_eq!(config.query_quota_per_second, NonZeroU32::new(10));
        // Unset fields keep their defaults.
        assert_eq!(config.flood_check_delay_ms, 5_000);
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "missed_ping_limit = \"many\"").unwrap();

        let err = MasterConfig::load(tmpfile.path()).unwrap_err();
        assert!(matches!(err, LobbyError::Config(_)));
    }
}
