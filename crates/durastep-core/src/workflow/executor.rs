//! Step executor: the claim -> execute -> commit protocol for one step.
//!
//! # Protocol
//!
//! 1. Allocate the next sequence number and form `<step_id>-<sequence>`.
//! 2. `try_claim` the key:
//!    - `AlreadyCompleted(output)`: decode and return it; the body never runs.
//!    - `Claimed`: continue.
//!    - `AlreadyPending`: an earlier attempt claimed the key and never
//!      committed. Run the body again and commit.
//! 3. Run the body. On error the record stays `PENDING` and the error is
//!    returned as `StepError::Body`; nothing is committed.
//! 4. Encode the result and `commit`. If another attempt committed first,
//!    its stored output wins and is what this call returns.

use std::future::Future;

use durastep_types::error::StoreError;
use durastep_types::step::{ClaimOutcome, CommitOutcome, RunId, StepKey};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::repository::checkpoint::CheckpointStore;

use super::codec::{Codec, CodecError, JsonCodec};
use super::context::ExecutionContext;

/// Execute one checkpointed step with the default JSON codec.
pub async fn execute<S, T, E, F, Fut>(
    ctx: &ExecutionContext<S>,
    step_id: &str,
    body: F,
) -> Result<T, StepError<E>>
where
    S: CheckpointStore,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    execute_with(ctx, &JsonCodec, step_id, body).await
}

/// Execute one checkpointed step, encoding its result with `codec`.
pub async fn execute_with<S, C, T, E, F, Fut>(
    ctx: &ExecutionContext<S>,
    codec: &C,
    step_id: &str,
    body: F,
) -> Result<T, StepError<E>>
where
    S: CheckpointStore,
    C: Codec,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let key = StepKey::new(step_id, ctx.sequence().next());
    run_step(ctx.store().as_ref(), ctx.run_id(), &key, codec, body).await
}

/// Run the protocol for a key whose sequence number is already allocated.
pub(crate) async fn run_step<S, C, T, E, F, Fut>(
    store: &S,
    run_id: &RunId,
    key: &StepKey,
    codec: &C,
    body: F,
) -> Result<T, StepError<E>>
where
    S: CheckpointStore,
    C: Codec,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let step_key = key.to_string();
    let claim = store.try_claim(run_id, &step_key).await?;
    let outcome = claim.label();

    match claim {
        ClaimOutcome::AlreadyCompleted(output) => {
            tracing::debug!(
                run_id = %run_id,
                step_key = step_key.as_str(),
                outcome,
                "replaying completed step"
            );
            return decode_stored(codec, step_key, &output);
        }
        ClaimOutcome::Claimed => {
            tracing::debug!(
                run_id = %run_id,
                step_key = step_key.as_str(),
                outcome,
                sequence = key.sequence(),
                "claimed step"
            );
        }
        ClaimOutcome::AlreadyPending => {
            tracing::warn!(
                run_id = %run_id,
                step_key = step_key.as_str(),
                outcome,
                "step left pending by an earlier attempt, executing again"
            );
        }
    }

    let value = body().await.map_err(|error| StepError::Body {
        step_key: step_key.clone(),
        error,
    })?;

    let payload = codec
        .encode(&value)
        .map_err(|source| StepError::Serialization {
            step_key: step_key.clone(),
            source,
        })?;

    match store.commit(run_id, &step_key, &payload).await? {
        CommitOutcome::Committed => {
            tracing::debug!(
                run_id = %run_id,
                step_key = step_key.as_str(),
                "committed step"
            );
            Ok(value)
        }
        CommitOutcome::AlreadyCompleted(stored) => {
            tracing::warn!(
                run_id = %run_id,
                step_key = step_key.as_str(),
                "step was committed by a concurrent attempt, returning stored output"
            );
            decode_stored(codec, step_key, &stored)
        }
    }
}

fn decode_stored<C, T, E>(codec: &C, step_key: String, output: &str) -> Result<T, StepError<E>>
where
    C: Codec,
    T: DeserializeOwned,
{
    codec
        .decode(output)
        .map_err(|source| StepError::Serialization { step_key, source })
}

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors surfaced by `execute` and `run_parallel`.
///
/// `E` is the error type of the step body and is carried unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StepError<E> {
    /// The checkpoint store could not be reached or returned bad data.
    #[error("checkpoint store error: {0}")]
    Store(#[source] StoreError),

    /// The step body failed. Its record stays `PENDING`.
    #[error("step '{step_key}' failed: {error}")]
    Body { step_key: String, error: E },

    /// The result could not be encoded, or a stored result could not be decoded.
    #[error("step '{step_key}' serialization failed: {source}")]
    Serialization {
        step_key: String,
        source: CodecError,
    },

    /// A parallel branch panicked or was aborted before finishing.
    #[error("parallel step task did not finish: {message}")]
    Join { message: String },
}

impl<E> From<StoreError> for StepError<E> {
    fn from(err: StoreError) -> Self {
        StepError::Store(err)
    }
}

impl<E> StepError<E> {
    /// The body error, if this is a body failure.
    pub fn into_body_error(self) -> Option<E> {
        match self {
            StepError::Body { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Key of the step that failed, when known.
    pub fn step_key(&self) -> Option<&str> {
        match self {
            StepError::Body { step_key, .. } | StepError::Serialization { step_key, .. } => {
                Some(step_key)
            }
            StepError::Store(_) | StepError::Join { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
