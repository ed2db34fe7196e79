//! Application state wiring configuration, database and engine together.

use std::path::PathBuf;

use durastep_core::workflow::StepEngine;
use durastep_infra::config::{database_url_from_env, default_data_dir, load_config};
use durastep_infra::sqlite::checkpoint::SqliteCheckpointStore;
use durastep_infra::sqlite::pool::DatabasePool;

/// The engine pinned to the SQLite checkpoint store.
pub type ConcreteEngine = StepEngine<SqliteCheckpointStore>;

/// Shared state for CLI commands.
pub struct AppState {
    pub engine: ConcreteEngine,
}

impl AppState {
    /// Initialize the application state: load config, connect to the DB.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let database_url = database_url_from_env(&config, &data_dir);

        let pool = DatabasePool::new(&database_url, &config).await?;
        let store = SqliteCheckpointStore::new(pool, config.clone());

        tracing::debug!(
            data_dir = %data_dir.display(),
            database_url = %database_url,
            "application state initialized"
        );

        Ok(Self {
            engine: StepEngine::new(store),
        })
    }

    pub async fn close(&self) {
        self.engine.store().pool().close().await;
    }
}

#[cfg(test)]
mod tests {
    use durastep_core::repository::checkpoint::CheckpointStore;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn init_creates_data_dir_and_database() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("nested").join("state");

        let state = AppState::init(Some(data_dir.clone())).await.unwrap();
        assert!(data_dir.join("durastep.db").exists());
        assert!(state.engine.store().list_runs().await.unwrap().is_empty());
        state.close().await;
    }
}
