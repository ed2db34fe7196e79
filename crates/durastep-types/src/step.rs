//! Step record types: the unit of durable state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied identity of one logical workflow execution.
///
/// Stable across every crash/restart attempt of the same run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Key of a step within a run: `<step_id>-<sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepKey {
    step_id: String,
    sequence: u64,
}

impl StepKey {
    pub fn new(step_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            step_id: step_id.into(),
            sequence,
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.step_id, self.sequence)
    }
}

/// Durable status of a step record.
///
/// There is no failed state: a body that errors leaves its record `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Completed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(StepStatus::Pending),
            "COMPLETED" => Ok(StepStatus::Completed),
            other => Err(format!("unknown step status '{other}'")),
        }
    }
}

/// One row of the checkpoint log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Owning run.
    pub run_id: RunId,
    /// `<step_id>-<sequence>`, unique within the run.
    pub step_key: String,
    pub status: StepStatus,
    /// Serialized result payload. Present only when `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// When the key was first claimed.
    pub created_at: DateTime<Utc>,
    /// When the record transitioned to `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-run aggregate used by inspection tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub pending: u64,
    pub completed: u64,
}

/// Result of atomically claiming a step key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// A completed record exists; carries its stored output.
    AlreadyCompleted(String),
    /// No record existed; this caller inserted the `Pending` row.
    Claimed,
    /// A `Pending` record already existed (crashed or in-flight attempt).
    AlreadyPending,
}

impl ClaimOutcome {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ClaimOutcome::AlreadyCompleted(_) => "already_completed",
            ClaimOutcome::Claimed => "claimed",
            ClaimOutcome::AlreadyPending => "already_pending",
        }
    }
}

/// Result of committing a step output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// This call moved the record from `Pending` to `Completed`.
    Committed,
    /// The record was already `Completed`; carries the output that won.
    AlreadyCompleted(String),
}
