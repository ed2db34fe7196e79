//! In-memory implementation of `CheckpointStore`.
//!
//! Records live in a mutex-guarded map, so claim and commit are atomic within
//! the process but nothing survives a restart. Useful for tests and for
//! callers that want the step protocol without durability.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use durastep_types::error::StoreError;
use durastep_types::step::{
    ClaimOutcome, CommitOutcome, RunId, RunSummary, StepRecord, StepStatus,
};

use super::checkpoint::CheckpointStore;

/// Process-local checkpoint store.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    /// Records per run, kept in claim order.
    runs: Mutex<BTreeMap<RunId, Vec<StepRecord>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<RunId, Vec<StepRecord>>>, StoreError> {
        self.runs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn claim_sync(&self, run_id: &RunId, step_key: &str) -> Result<ClaimOutcome, StoreError> {
        let mut runs = self.lock()?;
        let records = runs.entry(run_id.clone()).or_default();

        if let Some(existing) = records.iter().find(|r| r.step_key == step_key) {
            return match existing.status {
                StepStatus::Completed => existing
                    .output
                    .clone()
                    .map(ClaimOutcome::AlreadyCompleted)
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!("completed step '{step_key}' has no output"))
                    }),
                StepStatus::Pending => Ok(ClaimOutcome::AlreadyPending),
            };
        }

        records.push(StepRecord {
            run_id: run_id.clone(),
            step_key: step_key.to_string(),
            status: StepStatus::Pending,
            output: None,
            created_at: Utc::now(),
            completed_at: None,
        });
        Ok(ClaimOutcome::Claimed)
    }

    fn commit_sync(
        &self,
        run_id: &RunId,
        step_key: &str,
        output: &str,
    ) -> Result<CommitOutcome, StoreError> {
        let mut runs = self.lock()?;
        let record = runs
            .get_mut(run_id)
            .and_then(|records| records.iter_mut().find(|r| r.step_key == step_key))
            .ok_or_else(|| StoreError::NotClaimed {
                run_id: run_id.to_string(),
                step_key: step_key.to_string(),
            })?;

        match record.status {
            StepStatus::Completed => {
                let stored = record.output.clone().ok_or_else(|| {
                    StoreError::Corrupt(format!("completed step '{step_key}' has no output"))
                })?;
                Ok(CommitOutcome::AlreadyCompleted(stored))
            }
            StepStatus::Pending => {
                record.status = StepStatus::Completed;
                record.output = Some(output.to_string());
                record.completed_at = Some(Utc::now());
                Ok(CommitOutcome::Committed)
            }
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn try_claim(&self, run_id: &RunId, step_key: &str) -> Result<ClaimOutcome, StoreError> {
        self.claim_sync(run_id, step_key)
    }

    async fn commit(
        &self,
        run_id: &RunId,
        step_key: &str,
        output: &str,
    ) -> Result<CommitOutcome, StoreError> {
        self.commit_sync(run_id, step_key, output)
    }

    async fn get_step(
        &self,
        run_id: &RunId,
        step_key: &str,
    ) -> Result<Option<StepRecord>, StoreError> {
        let runs = self.lock()?;
        Ok(runs
            .get(run_id)
            .and_then(|records| records.iter().find(|r| r.step_key == step_key))
            .cloned())
    }

    async fn list_steps(&self, run_id: &RunId) -> Result<Vec<StepRecord>, StoreError> {
        let runs = self.lock()?;
        Ok(runs.get(run_id).cloned().unwrap_or_default())
    }

    async fn list_runs(&self) -> Result<Vec<RunSummary>, StoreError> {
        let runs = self.lock()?;
        Ok(runs
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(run_id, records)| {
                let completed = records
                    .iter()
                    .filter(|r| r.status == StepStatus::Completed)
                    .count() as u64;
                RunSummary {
                    run_id: run_id.clone(),
                    pending: records.len() as u64 - completed,
                    completed,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunId {
        RunId::new("run-1")
    }

    #[tokio::test]
    async fn test_claim_then_claim_again_is_pending() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(store.try_claim(&run(), "a-0").await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            store.try_claim(&run(), "a-0").await.unwrap(),
            ClaimOutcome::AlreadyPending
        );
    }

    #[tokio::test]
    async fn test_commit_then_claim_returns_output() {
        let store = MemoryCheckpointStore::new();
        store.try_claim(&run(), "a-0").await.unwrap();
        assert_eq!(
            store.commit(&run(), "a-0", "42").await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            store.try_claim(&run(), "a-0").await.unwrap(),
            ClaimOutcome::AlreadyCompleted("42".to_string())
        );
    }

    #[tokio::test]
    async fn test_second_commit_keeps_first_output() {
        let store = MemoryCheckpointStore::new();
        store.try_claim(&run(), "a-0").await.unwrap();
        store.commit(&run(), "a-0", "\"first\"").await.unwrap();

        let outcome = store.commit(&run(), "a-0", "\"second\"").await.unwrap();
        assert_eq!(outcome, CommitOutcome::AlreadyCompleted("\"first\"".to_string()));

        let record = store.get_step(&run(), "a-0").await.unwrap().unwrap();
        assert_eq!(record.output.as_deref(), Some("\"first\""));
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_commit_without_claim_is_rejected() {
        let store = MemoryCheckpointStore::new();
        let err = store.commit(&run(), "a-0", "1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotClaimed { .. }));
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let store = MemoryCheckpointStore::new();
        store.try_claim(&run(), "a-0").await.unwrap();
        store.commit(&run(), "a-0", "1").await.unwrap();

        let other = RunId::new("run-2");
        assert_eq!(store.try_claim(&other, "a-0").await.unwrap(), ClaimOutcome::Claimed);

        let runs = store.list_runs().await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], RunSummary { run_id: run(), pending: 0, completed: 1 });
        assert_eq!(runs[1], RunSummary { run_id: other, pending: 1, completed: 0 });
    }

    #[tokio::test]
    async fn test_list_steps_in_claim_order() {
        let store = MemoryCheckpointStore::new();
        for key in ["b-0", "a-1", "c-2"] {
            store.try_claim(&run(), key).await.unwrap();
        }
        let keys: Vec<String> = store
            .list_steps(&run())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.step_key)
            .collect();
        assert_eq!(keys, vec!["b-0", "a-1", "c-2"]);
    }
}
