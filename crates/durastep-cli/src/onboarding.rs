//! Employee onboarding: the demo workflow driven by `durastep onboard`.
//!
//! ```text
//! create-record -> { provision-laptop | provision-access } -> send-email
//! ```
//!
//! The driver is deterministic: it issues the same steps in the same order
//! on every run, so a resumed run replays onto the keys of the crashed one.
//! Side effects go through an [`EffectSink`] so they can be observed (and
//! counted) outside the checkpoint store.

use std::sync::Arc;

use durastep_core::repository::checkpoint::CheckpointStore;
use durastep_core::workflow::{ExecutionContext, ParallelStep, StepError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CREATE_RECORD: &str = "create-record";
pub const PROVISION_LAPTOP: &str = "provision-laptop";
pub const PROVISION_ACCESS: &str = "provision-access";
pub const SEND_EMAIL: &str = "send-email";

/// Step ids in driver order.
pub const STEP_IDS: [&str; 4] = [CREATE_RECORD, PROVISION_LAPTOP, PROVISION_ACCESS, SEND_EMAIL];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provisioned {
    pub item: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingSummary {
    pub employee: EmployeeRecord,
    pub laptop: Provisioned,
    pub access: Provisioned,
    pub email_to: String,
}

/// Why an onboarding run stopped.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Step(#[from] StepError<anyhow::Error>),

    #[error("provisioning batch returned {0} results, expected 2")]
    BatchSize(usize),
}

/// Where onboarding side effects land.
pub trait EffectSink: Send + Sync {
    /// Perform the externally visible effect of `step_id`.
    fn perform(&self, step_id: &str, detail: &str) -> anyhow::Result<()>;
}

/// Prints each effect; optionally kills the process right after one.
pub struct ConsoleSink {
    crash_in: Option<String>,
    quiet: bool,
}

impl ConsoleSink {
    pub fn new(crash_in: Option<String>, quiet: bool) -> Self {
        Self { crash_in, quiet }
    }
}

impl EffectSink for ConsoleSink {
    fn perform(&self, step_id: &str, detail: &str) -> anyhow::Result<()> {
        if !self.quiet {
            println!("  {} {detail}", console::style(format!("[{step_id}]")).cyan());
        }
        if self.crash_in.as_deref() == Some(step_id) {
            tracing::warn!(step_id, "crash injected after side effect, before commit");
            eprintln!(
                "{} simulated crash inside '{step_id}'",
                console::style("!").red().bold()
            );
            std::process::exit(137);
        }
        Ok(())
    }
}

/// Drive one onboarding run to completion (or to its first failure).
pub async fn run_onboarding<S>(
    ctx: &ExecutionContext<S>,
    employee: &str,
    sink: Arc<dyn EffectSink>,
) -> Result<OnboardingSummary, OnboardingError>
where
    S: CheckpointStore + 'static,
{
    let record = {
        let sink = Arc::clone(&sink);
        let name = employee.to_string();
        ctx.execute(CREATE_RECORD, || async move {
            let record = EmployeeRecord {
                employee_id: Uuid::now_v7(),
                name,
            };
            sink.perform(
                CREATE_RECORD,
                &format!("created HR record {} for {}", record.employee_id, record.name),
            )?;
            Ok::<_, anyhow::Error>(record)
        })
        .await?
    };

    let provisioned = ctx
        .run_parallel(vec![
            provision_step(PROVISION_LAPTOP, "laptop", &record, Arc::clone(&sink)),
            provision_step(PROVISION_ACCESS, "badge and accounts", &record, Arc::clone(&sink)),
        ])
        .await?;
    let (laptop, access) = laptop_and_access(provisioned)?;

    let email_to = {
        let sink = Arc::clone(&sink);
        let to = format!("{}@example.com", record.name.to_lowercase().replace(' ', "."));
        let body = format!("welcome aboard; laptop {} is on its way", laptop.reference);
        ctx.execute(SEND_EMAIL, || async move {
            sink.perform(SEND_EMAIL, &format!("emailed {to}: {body}"))?;
            Ok::<_, anyhow::Error>(to)
        })
        .await?
    };

    Ok(OnboardingSummary {
        employee: record,
        laptop,
        access,
        email_to,
    })
}

fn laptop_and_access(
    provisioned: Vec<Provisioned>,
) -> Result<(Provisioned, Provisioned), OnboardingError> {
    let len = provisioned.len();
    let mut batch = provisioned.into_iter();
    match (batch.next(), batch.next(), batch.next()) {
        (Some(laptop), Some(access), None) => Ok((laptop, access)),
        _ => Err(OnboardingError::BatchSize(len)),
    }
}

fn provision_step(
    step_id: &'static str,
    item: &'static str,
    record: &EmployeeRecord,
    sink: Arc<dyn EffectSink>,
) -> ParallelStep<Provisioned, anyhow::Error> {
    let employee_id = record.employee_id;
    ParallelStep::new(step_id, move || async move {
        let reference = format!("{step_id}/{employee_id}");
        sink.perform(step_id, &format!("provisioned {item} ({reference})"))?;
        Ok::<_, anyhow::Error>(Provisioned {
            item: item.to_string(),
            reference,
        })
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use durastep_core::repository::memory::MemoryCheckpointStore;
    use durastep_core::workflow::StepEngine;
    use durastep_types::step::{RunId, StepStatus};

    use super::*;

    /// Counts effects per step; fails the first call of `fail_once`.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<HashMap<String, usize>>,
        fail_once: Mutex<Option<String>>,
    }

    impl RecordingSink {
        fn failing_once(step_id: &str) -> Self {
            Self {
                fail_once: Mutex::new(Some(step_id.to_string())),
                ..Self::default()
            }
        }

        fn count(&self, step_id: &str) -> usize {
            self.calls.lock().unwrap().get(step_id).copied().unwrap_or(0)
        }
    }

    impl EffectSink for RecordingSink {
        fn perform(&self, step_id: &str, _detail: &str) -> anyhow::Result<()> {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(step_id.to_string())
                .or_default() += 1;
            let mut fail = self.fail_once.lock().unwrap();
            if fail.as_deref() == Some(step_id) {
                *fail = None;
                anyhow::bail!("{step_id} is down");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn onboarding_commits_every_step() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let sink = Arc::new(RecordingSink::default());

        let summary = run_onboarding(&engine.new_context("run-1"), "Ada Lovelace", sink.clone())
            .await
            .unwrap();
        assert_eq!(summary.employee.name, "Ada Lovelace");
        assert_eq!(summary.email_to, "ada.lovelace@example.com");
        assert_eq!(summary.laptop.item, "laptop");

        let steps = engine.store().list_steps(&RunId::new("run-1")).await.unwrap();
        let keys: Vec<_> = steps.iter().map(|s| s.step_key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "create-record-0",
                "provision-laptop-1",
                "provision-access-2",
                "send-email-3"
            ]
        );
        assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
        for step_id in STEP_IDS {
            assert_eq!(sink.count(step_id), 1, "{step_id}");
        }
    }

    #[tokio::test]
    async fn rerun_of_finished_run_replays_without_effects() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let sink = Arc::new(RecordingSink::default());

        let first = run_onboarding(&engine.new_context("run-1"), "Ada", sink.clone())
            .await
            .unwrap();
        let second = run_onboarding(&engine.new_context("run-1"), "Ada", sink.clone())
            .await
            .unwrap();

        assert_eq!(first, second);
        for step_id in STEP_IDS {
            assert_eq!(sink.count(step_id), 1, "{step_id}");
        }
    }

    #[tokio::test]
    async fn failed_branch_is_retried_on_resume() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let sink = Arc::new(RecordingSink::failing_once(PROVISION_ACCESS));

        let err = run_onboarding(&engine.new_context("run-1"), "Ada", sink.clone())
            .await
            .unwrap_err();
        let err = match err {
            OnboardingError::Step(err) => err,
            other => panic!("expected a step failure, got {other}"),
        };
        assert_eq!(err.step_key(), Some("provision-access-2"));
        // The sibling finished and the driver stopped before the email.
        assert_eq!(sink.count(PROVISION_LAPTOP), 1);
        assert_eq!(sink.count(SEND_EMAIL), 0);

        let summary = run_onboarding(&engine.new_context("run-1"), "Ada", sink.clone())
            .await
            .unwrap();
        assert_eq!(sink.count(CREATE_RECORD), 1);
        assert_eq!(sink.count(PROVISION_LAPTOP), 1);
        assert_eq!(sink.count(PROVISION_ACCESS), 2);
        assert_eq!(sink.count(SEND_EMAIL), 1);
        assert!(summary.access.reference.ends_with(&summary.employee.employee_id.to_string()));
    }

    #[test]
    fn provisioning_batch_must_hold_exactly_two_results() {
        let item = |name: &str| Provisioned {
            item: name.to_string(),
            reference: format!("{name}/1"),
        };

        let (laptop, access) =
            laptop_and_access(vec![item("laptop"), item("badge")]).unwrap();
        assert_eq!(laptop.item, "laptop");
        assert_eq!(access.item, "badge");

        let err = laptop_and_access(vec![item("laptop")]).unwrap_err();
        assert!(matches!(err, OnboardingError::BatchSize(1)));
        assert_eq!(err.to_string(), "provisioning batch returned 1 results, expected 2");

        let err = laptop_and_access(vec![item("a"), item("b"), item("c")]).unwrap_err();
        assert!(matches!(err, OnboardingError::BatchSize(3)));
    }

    #[tokio::test]
    async fn runs_do_not_share_checkpoints() {
        let engine = StepEngine::new(MemoryCheckpointStore::new());
        let sink = Arc::new(RecordingSink::default());

        let a = run_onboarding(&engine.new_context("run-a"), "Ada", sink.clone())
            .await
            .unwrap();
        let b = run_onboarding(&engine.new_context("run-b"), "Ada", sink.clone())
            .await
            .unwrap();

        assert_ne!(a.employee.employee_id, b.employee.employee_id);
        assert_eq!(sink.count(CREATE_RECORD), 2);
    }
}
