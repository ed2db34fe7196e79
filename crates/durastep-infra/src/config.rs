//! Configuration loader for durastep.
//!
//! Reads `durastep.toml` from the data directory (`~/.durastep/` in
//! production) and deserializes it into [`EngineConfig`]. The lenient loader
//! falls back to defaults when the file is missing or malformed; the strict
//! loader reports why.

use std::path::{Path, PathBuf};

use durastep_types::config::EngineConfig;

/// File name of the engine configuration inside the data directory.
pub const CONFIG_FILE_NAME: &str = "durastep.toml";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "DURASTEP_DATA_DIR";

/// Environment variable overriding the database URL from the config file.
pub const DATABASE_URL_ENV: &str = "DURASTEP_DATABASE_URL";

/// Errors from strict configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Returns the data directory from `DURASTEP_DATA_DIR`, falling back to
/// `~/.durastep`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".durastep")
}

/// Load configuration from `{data_dir}/durastep.toml`.
///
/// - If the file does not exist, returns [`EngineConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> EngineConfig {
    match load_config_strict(data_dir).await {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            EngineConfig::default()
        }
    }
}

/// Load configuration from `{data_dir}/durastep.toml`, surfacing read and
/// parse failures. A missing file still yields the defaults.
pub async fn load_config_strict(data_dir: &Path) -> Result<EngineConfig, ConfigError> {
    let config_path = data_dir.join(CONFIG_FILE_NAME);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE_NAME} found at {}, using defaults", config_path.display());
            return Ok(EngineConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: config_path,
                source,
            });
        }
    };

    toml::from_str::<EngineConfig>(&content).map_err(|source| ConfigError::Parse {
        path: config_path,
        source,
    })
}

/// Resolve the database URL.
///
/// Priority:
/// 1. `env_override` (the value of `DURASTEP_DATABASE_URL`, if set)
/// 2. `database_url` from the config file
/// 3. `sqlite://{data_dir}/durastep.db`
pub fn resolve_database_url(
    config: &EngineConfig,
    data_dir: &Path,
    env_override: Option<String>,
) -> String {
    env_override
        .filter(|url| !url.trim().is_empty())
        .or_else(|| config.database_url.clone())
        .unwrap_or_else(|| format!("sqlite://{}", data_dir.join("durastep.db").display()))
}

/// [`resolve_database_url`] reading the override from the environment.
pub fn database_url_from_env(config: &EngineConfig, data_dir: &Path) -> String {
    resolve_database_url(config, data_dir, std::env::var(DATABASE_URL_ENV).ok())
}
