//! Execution contexts: the per-run handle passed to every step invocation.

use std::future::Future;
use std::sync::Arc;

use durastep_types::step::RunId;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::repository::checkpoint::CheckpointStore;

use super::codec::Codec;
use super::executor::{self, StepError};
use super::parallel::{self, ParallelStep};
use super::sequence::SequenceAllocator;

// ---------------------------------------------------------------------------
// StepEngine
// ---------------------------------------------------------------------------

/// Entry point for workflow drivers: owns the store and hands out contexts.
pub struct StepEngine<S: CheckpointStore> {
    store: Arc<S>,
}

impl<S: CheckpointStore> StepEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a fresh context for `run_id`.
    ///
    /// Safe to call repeatedly with the same id (e.g. once per restart). It
    /// neither reads nor resets stored records; the new context's sequence
    /// starts at zero so a deterministic driver replays onto the same keys.
    pub fn new_context(&self, run_id: impl Into<RunId>) -> ExecutionContext<S> {
        ExecutionContext::new(run_id.into(), Arc::clone(&self.store))
    }
}

impl<S: CheckpointStore> Clone for StepEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Binds one run's identity, store handle, and sequence allocator.
///
/// Owned by a single run. Shareable by reference across that run's
/// concurrently executing steps: the allocator is the only mutable member
/// and it is atomic.
pub struct ExecutionContext<S: CheckpointStore> {
    run_id: RunId,
    store: Arc<S>,
    sequence: SequenceAllocator,
}

impl<S: CheckpointStore> ExecutionContext<S> {
    pub fn new(run_id: RunId, store: Arc<S>) -> Self {
        Self {
            run_id,
            store,
            sequence: SequenceAllocator::new(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn sequence(&self) -> &SequenceAllocator {
        &self.sequence
    }

    /// Run one checkpointed step. See [`executor::execute`].
    pub async fn execute<T, E, F, Fut>(&self, step_id: &str, body: F) -> Result<T, StepError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        executor::execute(self, step_id, body).await
    }

    /// Run one checkpointed step with an explicit codec.
    pub async fn execute_with<C, T, E, F, Fut>(
        &self,
        codec: &C,
        step_id: &str,
        body: F,
    ) -> Result<T, StepError<E>>
    where
        C: Codec,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        executor::execute_with(self, codec, step_id, body).await
    }

    /// Run a batch of independent steps concurrently. See [`parallel::run_parallel`].
    pub async fn run_parallel<T, E>(
        &self,
        steps: Vec<ParallelStep<T, E>>,
    ) -> Result<Vec<T>, StepError<E>>
    where
        S: 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Send + 'static,
    {
        parallel::run_parallel(self, steps).await
    }

    /// [`Self::run_parallel`] with an explicit codec.
    pub async fn run_parallel_with<C, T, E>(
        &self,
        codec: C,
        steps: Vec<ParallelStep<T, E>>,
    ) -> Result<Vec<T>, StepError<E>>
    where
        S: 'static,
        C: Codec + Clone + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Send + 'static,
    {
        parallel::run_parallel_with(self, codec, steps).await
    }
}
