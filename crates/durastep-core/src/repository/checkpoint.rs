//! Checkpoint store trait definition.
//!
//! Defines the storage interface for step records. Both operations of the
//! step protocol (`try_claim`, `commit`) must be atomic with respect to
//! concurrent callers on the same `(run_id, step_key)`; that atomicity comes
//! from the store's own concurrency control, never from engine-side locks.

use durastep_types::error::StoreError;
use durastep_types::step::{ClaimOutcome, CommitOutcome, RunId, RunSummary, StepRecord};

/// Repository trait for durable step records.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CheckpointStore: Send + Sync {
    /// Atomically claim `step_key` for `run_id`.
    ///
    /// Inserts a `PENDING` record if none exists and returns `Claimed`. If a
    /// record exists, returns `AlreadyCompleted(output)` or `AlreadyPending`
    /// without mutating it. Exactly one of any set of concurrent callers on
    /// the same key observes `Claimed`.
    fn try_claim(
        &self,
        run_id: &RunId,
        step_key: &str,
    ) -> impl std::future::Future<Output = Result<ClaimOutcome, StoreError>> + Send;

    /// Atomically move a `PENDING` record to `COMPLETED` with `output`.
    ///
    /// A record that is already `COMPLETED` is left untouched and its stored
    /// output is returned as `AlreadyCompleted`. Committing a key that was
    /// never claimed is `StoreError::NotClaimed`.
    fn commit(
        &self,
        run_id: &RunId,
        step_key: &str,
        output: &str,
    ) -> impl std::future::Future<Output = Result<CommitOutcome, StoreError>> + Send;

    /// Fetch a single step record.
    fn get_step(
        &self,
        run_id: &RunId,
        step_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<StepRecord>, StoreError>> + Send;

    /// List every record of a run in claim order.
    fn list_steps(
        &self,
        run_id: &RunId,
    ) -> impl std::future::Future<Output = Result<Vec<StepRecord>, StoreError>> + Send;

    /// Per-run pending/completed counts, ordered by run id.
    fn list_runs(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RunSummary>, StoreError>> + Send;
}
