//! SQLite checkpoint store implementation.
//!
//! Implements `CheckpointStore` from `durastep-core` on the
//! `step_checkpoints` table. Claim and commit each run in a single writer
//! transaction; the `(run_id, step_key)` primary key decides which of several
//! racing claimers inserts the row. Busy/locked errors from contending
//! writers are retried with backoff inside the store and never reach the
//! executor.

use std::future::Future;

use chrono::{DateTime, Utc};
use durastep_core::repository::checkpoint::CheckpointStore;
use durastep_types::config::EngineConfig;
use durastep_types::error::StoreError;
use durastep_types::step::{
    ClaimOutcome, CommitOutcome, RunId, RunSummary, StepRecord, StepStatus,
};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CheckpointStore`.
pub struct SqliteCheckpointStore {
    pool: DatabasePool,
    config: EngineConfig,
}

impl SqliteCheckpointStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Run `op`, retrying on SQLite busy/locked errors per the configured policy.
    async fn with_busy_retry<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_busy(&err) && attempt < self.config.busy_retry_attempts => {
                    attempt += 1;
                    let backoff = self.config.busy_retry_backoff(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "checkpoint store busy, retrying transaction"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(StoreError::Unavailable(format!("{operation}: {err}"))),
            }
        }
    }

    async fn claim_once(&self, run_id: &RunId, step_key: &str) -> Result<RawRow, sqlx::Error> {
        let mut tx = self.pool.writer.begin().await?;

        let inserted = sqlx::query(
            r#"INSERT INTO step_checkpoints (run_id, step_key, status, output, created_at)
               VALUES (?, ?, 'PENDING', NULL, ?)
               ON CONFLICT(run_id, step_key) DO NOTHING"#,
        )
        .bind(run_id.as_str())
        .bind(step_key)
        .bind(format_datetime(&Utc::now()))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let raw = if inserted == 1 {
            RawRow::Written
        } else {
            let row = sqlx::query(
                "SELECT status, output FROM step_checkpoints WHERE run_id = ? AND step_key = ?",
            )
            .bind(run_id.as_str())
            .bind(step_key)
            .fetch_optional(&mut *tx)
            .await?;
            RawRow::existing(row.as_ref())?
        };

        tx.commit().await?;
        Ok(raw)
    }

    async fn commit_once(
        &self,
        run_id: &RunId,
        step_key: &str,
        output: &str,
    ) -> Result<RawRow, sqlx::Error> {
        let mut tx = self.pool.writer.begin().await?;

        let updated = sqlx::query(
            r#"UPDATE step_checkpoints
               SET status = 'COMPLETED', output = ?, completed_at = ?
               WHERE run_id = ? AND step_key = ? AND status = 'PENDING'"#,
        )
        .bind(output)
        .bind(format_datetime(&Utc::now()))
        .bind(run_id.as_str())
        .bind(step_key)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let raw = if updated == 1 {
            RawRow::Written
        } else {
            let row = sqlx::query(
                "SELECT status, output FROM step_checkpoints WHERE run_id = ? AND step_key = ?",
            )
            .bind(run_id.as_str())
            .bind(step_key)
            .fetch_optional(&mut *tx)
            .await?;
            RawRow::existing(row.as_ref())?
        };

        tx.commit().await?;
        Ok(raw)
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

/// What a claim/commit transaction observed, before interpretation.
enum RawRow {
    /// This transaction inserted (claim) or updated (commit) the row.
    Written,
    /// The row already existed in the given state.
    Existing { status: String, output: Option<String> },
    /// No row exists for the key.
    Missing,
}

impl RawRow {
    fn existing(row: Option<&sqlx::sqlite::SqliteRow>) -> Result<Self, sqlx::Error> {
        match row {
            Some(row) => Ok(RawRow::Existing {
                status: row.try_get("status")?,
                output: row.try_get("output")?,
            }),
            None => Ok(RawRow::Missing),
        }
    }
}

struct StepRow {
    run_id: String,
    step_key: String,
    status: String,
    output: Option<String>,
    created_at: String,
    completed_at: Option<String>,
}

impl StepRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            run_id: row.try_get("run_id")?,
            step_key: row.try_get("step_key")?,
            status: row.try_get("status")?,
            output: row.try_get("output")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_record(self) -> Result<StepRecord, StoreError> {
        let status = parse_status(&self.status)?;
        let created_at = parse_datetime(&self.created_at)?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(StepRecord {
            run_id: RunId::new(self.run_id),
            step_key: self.step_key,
            status,
            output: self.output,
            created_at,
            completed_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// SQLITE_BUSY, SQLITE_LOCKED and their extended variants.
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("5" | "6" | "261" | "262" | "517"))
                || db_err.message().contains("database is locked")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

fn parse_status(s: &str) -> Result<StepStatus, StoreError> {
    s.parse::<StepStatus>().map_err(StoreError::Corrupt)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn completed_output(step_key: &str, output: Option<String>) -> Result<String, StoreError> {
    output.ok_or_else(|| StoreError::Corrupt(format!("completed step '{step_key}' has no output")))
}

fn query_error(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

// ---------------------------------------------------------------------------
// CheckpointStore impl
// ---------------------------------------------------------------------------

impl CheckpointStore for SqliteCheckpointStore {
    async fn try_claim(&self, run_id: &RunId, step_key: &str) -> Result<ClaimOutcome, StoreError> {
        let raw = self
            .with_busy_retry("claim", move || self.claim_once(run_id, step_key))
            .await?;

        match raw {
            RawRow::Written => Ok(ClaimOutcome::Claimed),
            RawRow::Existing { status, output } => match parse_status(&status)? {
                StepStatus::Completed => Ok(ClaimOutcome::AlreadyCompleted(completed_output(
                    step_key, output,
                )?)),
                StepStatus::Pending => Ok(ClaimOutcome::AlreadyPending),
            },
            RawRow::Missing => Err(StoreError::Corrupt(format!(
                "claim of '{step_key}' neither inserted nor found a row"
            ))),
        }
    }

    async fn commit(
        &self,
        run_id: &RunId,
        step_key: &str,
        output: &str,
    ) -> Result<CommitOutcome, StoreError> {
        let raw = self
            .with_busy_retry("commit", move || self.commit_once(run_id, step_key, output))
            .await?;

        match raw {
            RawRow::Written => Ok(CommitOutcome::Committed),
            RawRow::Existing { status, output } => match parse_status(&status)? {
                StepStatus::Completed => Ok(CommitOutcome::AlreadyCompleted(completed_output(
                    step_key, output,
                )?)),
                StepStatus::Pending => Err(StoreError::Corrupt(format!(
                    "pending step '{step_key}' could not be completed"
                ))),
            },
            RawRow::Missing => Err(StoreError::NotClaimed {
                run_id: run_id.to_string(),
                step_key: step_key.to_string(),
            }),
        }
    }

    async fn get_step(
        &self,
        run_id: &RunId,
        step_key: &str,
    ) -> Result<Option<StepRecord>, StoreError> {
        let row = sqlx::query(
            r#"SELECT run_id, step_key, status, output, created_at, completed_at
               FROM step_checkpoints WHERE run_id = ? AND step_key = ?"#,
        )
        .bind(run_id.as_str())
        .bind(step_key)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = StepRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn list_steps(&self, run_id: &RunId) -> Result<Vec<StepRecord>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT run_id, step_key, status, output, created_at, completed_at
               FROM step_checkpoints WHERE run_id = ? ORDER BY rowid ASC"#,
        )
        .bind(run_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = StepRow::from_row(row).map_err(query_error)?;
            records.push(r.into_record()?);
        }
        Ok(records)
    }

    async fn list_runs(&self) -> Result<Vec<RunSummary>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT run_id,
                      SUM(CASE WHEN status = 'PENDING' THEN 1 ELSE 0 END) AS pending,
                      SUM(CASE WHEN status = 'COMPLETED' THEN 1 ELSE 0 END) AS completed
               FROM step_checkpoints
               GROUP BY run_id
               ORDER BY run_id ASC"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in &rows {
            let run_id: String = row.try_get("run_id").map_err(query_error)?;
            let pending: i64 = row.try_get("pending").map_err(query_error)?;
            let completed: i64 = row.try_get("completed").map_err(query_error)?;
            runs.push(RunSummary {
                run_id: RunId::new(run_id),
                pending: pending as u64,
                completed: completed as u64,
            });
        }
        Ok(runs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
