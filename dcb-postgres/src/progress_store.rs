//! Durable processor progress (§4.6).
//!
//! Grounded on the teacher's `PgEventListenerConfig`/listener row, which
//! tracked a single `last_processed_id` per listener; generalized into the
//! full state machine the spec names (`ACTIVE`/`PAUSED`/`FAILED`) plus a
//! consecutive-error counter, since the teacher never models a processor
//! pausing or failing itself — it only retries forever.
use dcb_core::event::chrono_compat::Timestamp;
use dcb_core::{ProcessorProgress, ProcessorStatus};
use sqlx::PgPool;

use crate::error::Error;

fn status_to_str(status: ProcessorStatus) -> &'static str {
    match status {
        ProcessorStatus::Active => "active",
        ProcessorStatus::Paused => "paused",
        ProcessorStatus::Failed => "failed",
    }
}

fn str_to_status(s: &str) -> ProcessorStatus {
    match s {
        "paused" => ProcessorStatus::Paused,
        "failed" => ProcessorStatus::Failed,
        _ => ProcessorStatus::Active,
    }
}

#[allow(clippy::type_complexity)]
fn row_to_progress(
    processor_id: String,
    (position, status, errors, instance_id, last_error, last_error_at): (
        i64,
        String,
        i32,
        Option<String>,
        Option<String>,
        Option<chrono::DateTime<chrono::Utc>>,
    ),
) -> ProcessorProgress {
    ProcessorProgress {
        processor_id,
        position: position as u64,
        status: str_to_status(&status),
        consecutive_errors: errors as u32,
        instance_id,
        last_error,
        last_error_at: last_error_at.map(|t| Timestamp::from_millis(t.timestamp_millis())),
    }
}

/// Progress tracking for every registered processor, backed by
/// `dcb_processor_progress`.
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a fresh `ACTIVE` progress row for `processor_id` if one
    /// doesn't already exist, so a newly deployed handler starts reading
    /// from position zero without an operator having to seed it manually.
    /// `instance_id` identifies the engine instance doing the registering
    /// (§4.6), and is recorded even when the row already existed, so the
    /// column always reflects whichever instance most recently claimed it.
    pub async fn auto_register(&self, processor_id: &str, instance_id: &str) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO dcb_processor_progress (processor_id, instance_id) VALUES ($1, $2) \
             ON CONFLICT (processor_id) DO UPDATE SET instance_id = EXCLUDED.instance_id",
        )
        .bind(processor_id)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_status(&self, processor_id: &str) -> Result<Option<ProcessorProgress>, Error> {
        let row: Option<(i64, String, i32, Option<String>, Option<String>, Option<chrono::DateTime<chrono::Utc>>)> =
            sqlx::query_as(
                "SELECT position, status, consecutive_errors, instance_id, last_error, last_error_at \
                 FROM dcb_processor_progress WHERE processor_id = $1",
            )
            .bind(processor_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row_to_progress(processor_id.to_string(), row)))
    }

    pub async fn get_all_statuses(&self) -> Result<Vec<ProcessorProgress>, Error> {
        let rows: Vec<(String, i64, String, i32, Option<String>, Option<String>, Option<chrono::DateTime<chrono::Utc>>)> =
            sqlx::query_as(
                "SELECT processor_id, position, status, consecutive_errors, instance_id, last_error, last_error_at \
                 FROM dcb_processor_progress",
            )
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(processor_id, position, status, errors, instance_id, last_error, last_error_at)| {
                row_to_progress(processor_id, (position, status, errors, instance_id, last_error, last_error_at))
            })
            .collect())
    }

    /// Advances `processor_id`'s checkpoint and resets its error counter,
    /// called after a batch is fully handled without error.
    pub async fn update_progress(&self, processor_id: &str, position: u64) -> Result<(), Error> {
        sqlx::query(
            "UPDATE dcb_processor_progress SET position = $2, consecutive_errors = 0, updated_at = now() WHERE processor_id = $1",
        )
        .bind(processor_id)
        .bind(position as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Increments the consecutive-error counter, records `message` as the
    /// processor's most recent error (§4.6 `recordError(message,
    /// maxErrors)`), and flips status to `FAILED` if `max_errors` is
    /// reached (§4.9's error-threshold transition).
    pub async fn record_error(&self, processor_id: &str, message: &str, max_errors: u32) -> Result<ProcessorStatus, Error> {
        let (errors,): (i32,) = sqlx::query_as(
            "UPDATE dcb_processor_progress SET consecutive_errors = consecutive_errors + 1, \
             last_error = $2, last_error_at = now(), updated_at = now() \
             WHERE processor_id = $1 RETURNING consecutive_errors",
        )
        .bind(processor_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        if errors as u32 >= max_errors {
            self.set_status(processor_id, ProcessorStatus::Failed).await?;
            Ok(ProcessorStatus::Failed)
        } else {
            Ok(ProcessorStatus::Active)
        }
    }

    pub async fn reset_error_count(&self, processor_id: &str) -> Result<(), Error> {
        sqlx::query("UPDATE dcb_processor_progress SET consecutive_errors = 0 WHERE processor_id = $1")
            .bind(processor_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_status(&self, processor_id: &str, status: ProcessorStatus) -> Result<(), Error> {
        sqlx::query("UPDATE dcb_processor_progress SET status = $2, updated_at = now() WHERE processor_id = $1")
            .bind(processor_id)
            .bind(status_to_str(status))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Resets a processor back to position zero with a clean error count,
    /// for operator-initiated replay.
    pub async fn reset(&self, processor_id: &str) -> Result<(), Error> {
        sqlx::query(
            "UPDATE dcb_processor_progress SET position = 0, consecutive_errors = 0, status = 'active', updated_at = now() WHERE processor_id = $1",
        )
        .bind(processor_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
