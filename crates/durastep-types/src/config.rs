//! Engine configuration types.
//!
//! `EngineConfig` represents `durastep.toml`, which controls where checkpoints
//! are stored and how the store behaves under write contention.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the checkpoint engine.
///
/// Loaded from `~/.durastep/durastep.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite URL of the checkpoint database. When unset, the loader derives
    /// `sqlite://{data_dir}/durastep.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// How long a connection waits on a locked database before giving up.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Size of the read-only connection pool.
    #[serde(default = "default_max_reader_connections")]
    pub max_reader_connections: u32,

    /// Times a claim/commit transaction is retried after a busy/locked error.
    #[serde(default = "default_busy_retry_attempts")]
    pub busy_retry_attempts: u32,

    /// Backoff before the first busy retry; doubled on each further attempt.
    #[serde(default = "default_busy_retry_backoff_ms")]
    pub busy_retry_backoff_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_reader_connections() -> u32 {
    8
}

fn default_busy_retry_attempts() -> u32 {
    5
}

fn default_busy_retry_backoff_ms() -> u64 {
    20
}

impl EngineConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn busy_retry_backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.busy_retry_backoff_ms.saturating_mul(1 << shift))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            max_reader_connections: default_max_reader_connections(),
            busy_retry_attempts: default_busy_retry_attempts(),
            busy_retry_backoff_ms: default_busy_retry_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.max_reader_connections, 8);
        assert_eq!(config.busy_retry_attempts, 5);
    }

    #[test]
    fn test_engine_config_deserialize_with_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
database_url = "sqlite:///var/lib/durastep/checkpoints.db"
busy_timeout_ms = 250
busy_retry_attempts = 2
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("sqlite:///var/lib/durastep/checkpoints.db")
        );
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.busy_retry_attempts, 2);
        assert_eq!(config.max_reader_connections, 8);
    }

    #[test]
    fn test_busy_retry_backoff_doubles() {
        let config = EngineConfig {
            busy_retry_backoff_ms: 10,
            ..EngineConfig::default()
        };
        assert_eq!(config.busy_retry_backoff(1), Duration::from_millis(10));
        assert_eq!(config.busy_retry_backoff(2), Duration::from_millis(20));
        assert_eq!(config.busy_retry_backoff(4), Duration::from_millis(80));
    }
}
