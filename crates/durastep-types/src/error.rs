use thiserror::Error;

/// Errors from checkpoint store operations.
///
/// Expected races (a key already pending or already completed) are not
/// errors; they are reported through `ClaimOutcome` and `CommitOutcome`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt checkpoint record: {0}")]
    Corrupt(String),

    #[error("step '{step_key}' of run '{run_id}' was never claimed")]
    NotClaimed { run_id: String, step_key: String },
}
