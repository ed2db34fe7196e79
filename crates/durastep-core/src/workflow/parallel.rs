//! Parallel coordinator: concurrent fan-out of independent steps.
//!
//! Sequence numbers for the whole batch are reserved up front, in the order
//! the steps are declared, before any branch is spawned. Only the body and
//! the commit of each branch run concurrently, so replay lands on the same
//! keys no matter which branch finishes first. Branches run as
//! `tokio::JoinSet` tasks; results come back in declaration order.

use std::future::Future;
use std::sync::Arc;

use durastep_types::step::StepKey;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;

use crate::repository::checkpoint::CheckpointStore;

use super::codec::{Codec, JsonCodec};
use super::context::ExecutionContext;
use super::executor::{StepError, run_step};

type StepBody<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

/// One branch of a parallel batch: a step id and its unit of work.
pub struct ParallelStep<T, E> {
    step_id: String,
    body: StepBody<T, E>,
}

impl<T, E> ParallelStep<T, E> {
    pub fn new<F, Fut>(step_id: impl Into<String>, body: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            step_id: step_id.into(),
            body: Box::new(move || Box::pin(body())),
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }
}

/// Run `steps` concurrently with the default JSON codec.
pub async fn run_parallel<S, T, E>(
    ctx: &ExecutionContext<S>,
    steps: Vec<ParallelStep<T, E>>,
) -> Result<Vec<T>, StepError<E>>
where
    S: CheckpointStore + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
    E: Send + 'static,
{
    run_parallel_with(ctx, JsonCodec, steps).await
}

/// Run `steps` concurrently and return their results in input order.
///
/// If any branch fails, every other branch is still awaited to a terminal
/// outcome (committed or failed) before the first observed error is
/// returned. Branches that succeeded stay committed.
pub async fn run_parallel_with<S, C, T, E>(
    ctx: &ExecutionContext<S>,
    codec: C,
    steps: Vec<ParallelStep<T, E>>,
) -> Result<Vec<T>, StepError<E>>
where
    S: CheckpointStore + 'static,
    C: Codec + Clone + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
    E: Send + 'static,
{
    if steps.is_empty() {
        return Ok(Vec::new());
    }

    let batch = ctx.sequence().next_block(steps.len() as u64);
    tracing::debug!(
        run_id = %ctx.run_id(),
        branches = steps.len(),
        first_sequence = batch.start,
        "dispatching parallel steps"
    );

    let mut join_set = JoinSet::new();
    let mut results: Vec<Option<T>> = Vec::with_capacity(steps.len());

    for (index, (step, sequence)) in steps.into_iter().zip(batch).enumerate() {
        results.push(None);
        let key = StepKey::new(step.step_id, sequence);
        let store = Arc::clone(ctx.store());
        let run_id = ctx.run_id().clone();
        let codec = codec.clone();
        let body = step.body;

        join_set.spawn(async move {
            let result = run_step(store.as_ref(), &run_id, &key, &codec, body).await;
            (index, result)
        });
    }

    let mut first_error = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, Ok(value))) => results[index] = Some(value),
            Ok((_, Err(err))) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
            Err(join_err) => {
                if first_error.is_none() {
                    first_error = Some(StepError::Join {
                        message: join_err.to_string(),
                    });
                }
            }
        }
    }

    if let Some(err) = first_error {
        tracing::debug!(run_id = %ctx.run_id(), error = %ErrorLabel(&err), "parallel batch failed");
        return Err(err);
    }

    results
        .into_iter()
        .map(|slot| {
            slot.ok_or_else(|| StepError::Join {
                message: "parallel branch produced no result".to_string(),
            })
        })
        .collect()
}

/// Display adapter that names the failing step without requiring `E: Display`.
struct ErrorLabel<'a, E>(&'a StepError<E>);

impl<E> std::fmt::Display for ErrorLabel<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            StepError::Store(err) => write!(f, "store: {err}"),
            StepError::Body { step_key, .. } => write!(f, "body of '{step_key}'"),
            StepError::Serialization { step_key, .. } => {
                write!(f, "serialization of '{step_key}'")
            }
            StepError::Join { message } => write!(f, "join: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use durastep_types::step::{RunId, StepStatus};

    use super::*;
    use crate::repository::memory::MemoryCheckpointStore;
    use crate::workflow::context::StepEngine;

    fn sleepy(id: &'static str, millis: u64) -> ParallelStep<String, String> {
        ParallelStep::new(id, move || async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(id.to_uppercase())
        })
    }

    async fn keys(engine: &StepEngine<MemoryCheckpointStore>, run: &str) -> Vec<String> {
        engine
            .store()
            .list_steps(&RunId::new(run))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.step_key)
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn keys_follow_declaration_order_not_completion_order() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let ctx = engine.new_context("run-1");

        let out = ctx
            .run_parallel(vec![sleepy("a", 60), sleepy("b", 30), sleepy("c", 0)])
            .await
            .unwrap();
        assert_eq!(out, vec!["A", "B", "C"]);

        let mut stored = keys(&engine, "run-1").await;
        stored.sort();
        assert_eq!(stored, vec!["a-0", "b-1", "c-2"]);
    }

    #[tokio::test]
    async fn sequence_continues_after_batch() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let ctx = engine.new_context("run-1");

        ctx.execute("before", || async { Ok::<_, String>(1) })
            .await
            .unwrap();
        ctx.run_parallel(vec![sleepy("x", 1), sleepy("y", 1)])
            .await
            .unwrap();
        ctx.execute("after", || async { Ok::<_, String>(2) })
            .await
            .unwrap();

        let mut stored = keys(&engine, "run-1").await;
        stored.sort();
        assert_eq!(stored, vec!["after-3", "before-0", "x-1", "y-2"]);
    }

    #[tokio::test]
    async fn empty_batch_allocates_nothing() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let ctx = engine.new_context("run-1");
        let out = ctx
            .run_parallel::<String, String>(Vec::new())
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(ctx.sequence().allocated(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failure_waits_for_siblings_to_commit() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let ctx = engine.new_context("run-1");

        let failing: ParallelStep<String, String> =
            ParallelStep::new("b", || async { Err("access denied".to_string()) });
        let err = ctx
            .run_parallel(vec![sleepy("a", 50), failing, sleepy("c", 80)])
            .await
            .unwrap_err();

        assert_eq!(err.step_key(), Some("b-1"));
        assert_eq!(err.into_body_error().as_deref(), Some("access denied"));

        let records = engine.store().list_steps(&RunId::new("run-1")).await.unwrap();
        let status = |key: &str| {
            records
                .iter()
                .find(|r| r.step_key == key)
                .map(|r| r.status)
        };
        assert_eq!(status("a-0"), Some(StepStatus::Completed));
        assert_eq!(status("b-1"), Some(StepStatus::Pending));
        assert_eq!(status("c-2"), Some(StepStatus::Completed));
    }

    #[tokio::test]
    async fn replayed_batch_only_reruns_unfinished_branches() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = |id: &'static str, fail: bool| {
            let calls = Arc::clone(&calls);
            ParallelStep::new(id, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(format!("{id} failed"))
                } else {
                    Ok(id.to_string())
                }
            })
        };

        let ctx = engine.new_context("run-1");
        let first = ctx
            .run_parallel(vec![counted("laptop", false), counted("access", true)])
            .await;
        assert!(first.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let ctx = engine.new_context("run-1");
        let out = ctx
            .run_parallel(vec![counted("laptop", false), counted("access", false)])
            .await
            .unwrap();
        assert_eq!(out, vec!["laptop", "access"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3, "laptop replayed from checkpoint");
    }

    #[tokio::test]
    async fn panicking_branch_surfaces_as_join_error() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let ctx = engine.new_context("run-1");

        let panicking: ParallelStep<u32, String> = ParallelStep::new("boom", || async {
            panic!("branch exploded");
        });
        let err = ctx.run_parallel(vec![panicking]).await.unwrap_err();
        assert!(matches!(err, StepError::Join { .. }));
    }
}
