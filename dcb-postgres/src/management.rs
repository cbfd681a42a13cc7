//! Operator-facing processor management (§6's external interface over the
//! progress store).
//!
//! None of this exists in the teacher, whose listeners run unattended with
//! no pause/resume surface; grounded instead on the spec's own external
//! interface table, backed by [`PgProgressStore`] and [`dcb_core::BackoffConfig`].
use dcb_core::{BackoffConfig, ProcessorProgress, ProcessorStatus};
use sqlx::PgPool;

use crate::error::Error;
use crate::progress_store::PgProgressStore;

/// How far behind a processor is, in log positions, relative to the
/// current end of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lag {
    pub processor_position: u64,
    pub log_position: u64,
}

impl Lag {
    pub fn events_behind(&self) -> u64 {
        self.log_position.saturating_sub(self.processor_position)
    }
}

/// A thin operator-facing wrapper over [`PgProgressStore`], exposing the
/// operations an admin surface or CLI needs without depending on the
/// processor runtime itself.
pub struct ProcessorManagement {
    pool: PgPool,
    progress: PgProgressStore,
}

impl ProcessorManagement {
    pub fn new(pool: PgPool) -> Self {
        let progress = PgProgressStore::new(pool.clone());
        Self { pool, progress }
    }

    pub async fn pause(&self, processor_id: &str) -> Result<(), Error> {
        self.progress.set_status(processor_id, ProcessorStatus::Paused).await
    }

    pub async fn resume(&self, processor_id: &str) -> Result<(), Error> {
        self.progress.set_status(processor_id, ProcessorStatus::Active).await
    }

    pub async fn reset(&self, processor_id: &str) -> Result<(), Error> {
        self.progress.reset(processor_id).await
    }

    pub async fn get_status(&self, processor_id: &str) -> Result<Option<ProcessorProgress>, Error> {
        self.progress.get_status(processor_id).await
    }

    pub async fn get_all_statuses(&self) -> Result<Vec<ProcessorProgress>, Error> {
        self.progress.get_all_statuses().await
    }

    pub async fn get_lag(&self, processor_id: &str) -> Result<Option<Lag>, Error> {
        let Some(progress) = self.progress.get_status(processor_id).await? else {
            return Ok(None);
        };
        let (log_position,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(position) FROM dcb_events")
                .fetch_one(&self.pool)
                .await?;
        Ok(Some(Lag {
            processor_position: progress.position,
            log_position: log_position.unwrap_or(0) as u64,
        }))
    }

    /// Reports what delay a processor would currently back off by, given
    /// its recorded consecutive-error count and the runtime's backoff
    /// curve, useful for an admin surface explaining why a processor looks
    /// idle.
    pub async fn get_backoff_info(
        &self,
        processor_id: &str,
        backoff: &BackoffConfig,
    ) -> Result<Option<std::time::Duration>, Error> {
        let Some(progress) = self.progress.get_status(processor_id).await? else {
            return Ok(None);
        };
        Ok(Some(backoff.backoff(progress.consecutive_errors)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lag_is_the_gap_between_processor_and_log() {
        let lag = Lag {
            processor_position: 10,
            log_position: 25,
        };
        assert_eq!(lag.events_behind(), 15);
    }

    #[test]
    fn lag_never_goes_negative_when_processor_is_ahead() {
        let lag = Lag {
            processor_position: 25,
            log_position: 10,
        };
        assert_eq!(lag.events_behind(), 0);
    }
}
