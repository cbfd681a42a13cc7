//! The Event Processor Runtime (§4.9): leader-elected, progress-tracked,
//! at-least-once dispatch with adaptive idle backoff.
//!
//! Grounded on the teacher's `PgEventListenerExecutor::spawn_task`, which
//! drives `tokio::select!` over an interval tick, a `PgListener` NOTIFY
//! wake, and a shutdown signal; kept here with the same three-way select,
//! but the interval is no longer fixed — consecutive empty polls grow it
//! via [`dcb_core::BackoffConfig`] — and leadership/progress/error-count
//! bookkeeping is layered in around the teacher's acquire→handle→release
//! cycle.
use std::sync::Arc;

use dcb_core::{Cursor, EventHandler, EventStore, MetricSignal, MetricSink, NoopMetricSink, ProcessorConfig, ProcessorStatus};
use futures::StreamExt;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::event_store::PgEventStore;
use crate::leader;
use crate::progress_store::PgProgressStore;

/// Drives one [`EventHandler`] to completion until `shutdown` fires.
///
/// Each iteration: try to acquire leadership, and if acquired, fetch a
/// batch after the last checkpoint, dispatch every event in order,
/// advance progress on success or record an error (pausing into `FAILED`
/// past the configured threshold) on failure, then wait out either the
/// next NOTIFY wake or the current backoff delay before looping.
pub struct PgProcessorRuntime {
    pool: PgPool,
    store: PgEventStore,
    progress: PgProgressStore,
    config: ProcessorConfig,
    instance_id: String,
    metrics: Arc<dyn MetricSink>,
}

impl PgProcessorRuntime {
    pub fn new(pool: PgPool, instance_id: impl Into<String>, config: ProcessorConfig) -> Self {
        Self::with_metrics(pool, instance_id, config, Arc::new(NoopMetricSink))
    }

    /// As [`Self::new`], but publishing [`MetricSignal`]s to `metrics`
    /// instead of discarding them (§4.7's leadership signal, §4.9's
    /// progress/status signals).
    pub fn with_metrics(
        pool: PgPool,
        instance_id: impl Into<String>,
        config: ProcessorConfig,
        metrics: Arc<dyn MetricSink>,
    ) -> Self {
        let store = PgEventStore::new(pool.clone());
        let progress = PgProgressStore::new(pool.clone());
        Self {
            pool,
            store,
            progress,
            config,
            instance_id: instance_id.into(),
            metrics,
        }
    }

    pub async fn run(
        &self,
        handler: Arc<dyn EventHandler>,
        shutdown: CancellationToken,
    ) -> Result<(), Error> {
        let processor_id = handler.processor_id().to_string();
        self.progress.auto_register(&processor_id, &self.instance_id).await?;

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen("dcb_events_channel").await?;

        let mut consecutive_idle_polls: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            let progress = self
                .progress
                .get_status(&processor_id)
                .await?
                .expect("auto_register guarantees a progress row exists");

            if !matches!(progress.status, ProcessorStatus::Active) {
                tracing::debug!(processor_id = %processor_id, status = ?progress.status, "processor not active, idling");
                self.wait_for_wake_or_timeout(&mut listener, self.config.backoff.max, &shutdown)
                    .await;
                continue;
            }

            match leader::try_acquire(&self.pool, self.config.leader_strategy, &processor_id).await? {
                None => {
                    self.wait_for_wake_or_timeout(&mut listener, self.config.backoff.max, &shutdown)
                        .await;
                    continue;
                }
                Some(guard) => {
                    self.metrics.record(MetricSignal::LeadershipChanged { acquired: true });
                    let handled = self.handle_batch(handler.as_ref(), &processor_id, progress.position).await;
                    guard.release().await?;
                    self.metrics.record(MetricSignal::LeadershipChanged { acquired: false });

                    match handled {
                        Ok(0) => {
                            consecutive_idle_polls += 1;
                            let delay = self.config.backoff.backoff(consecutive_idle_polls);
                            self.wait_for_wake_or_timeout(&mut listener, delay, &shutdown).await;
                        }
                        Ok(events_handled) => {
                            consecutive_idle_polls = 0;
                            self.metrics.record(MetricSignal::ProcessorProgressed { events_handled });
                        }
                        Err(e) => {
                            tracing::warn!(processor_id, error = %e, "processor batch failed");
                            self.metrics.record(MetricSignal::ProcessorHandlerError);
                            let status = self
                                .progress
                                .record_error(&processor_id, &e.to_string(), self.config.max_consecutive_errors)
                                .await?;
                            if matches!(status, ProcessorStatus::Failed) {
                                tracing::error!(processor_id, "processor exceeded error threshold, marking failed");
                                self.metrics.record(MetricSignal::ProcessorStatusChanged);
                            }
                            let delay = self.config.backoff.backoff(consecutive_idle_polls + 1);
                            self.wait_for_wake_or_timeout(&mut listener, delay, &shutdown).await;
                        }
                    }
                }
            }
        }
    }

    /// Fetches and dispatches one batch, returning the number of events
    /// handled. Progress only advances after every event in the batch has
    /// been handled without error, so a crash mid-batch is safe to
    /// re-deliver from the last checkpoint (at-least-once, §4.9).
    async fn handle_batch(
        &self,
        handler: &dyn EventHandler,
        processor_id: &str,
        after_position: u64,
    ) -> Result<usize, Error> {
        let query = handler.query();
        let after = Cursor::new(after_position, 0);
        let mut stream = self.store.read_matching(&query, after);

        let mut handled = 0usize;
        let mut last_position = after_position;
        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| Error::Database(store_error_to_sqlx(e)))?;
            handler
                .handle(&event)
                .await
                .map_err(|e| Error::HandlerFailure(e.to_string()))?;
            last_position = event.position();
            handled += 1;
            if handled >= self.config.batch_size as usize {
                break;
            }
        }

        if handled > 0 {
            self.progress.update_progress(processor_id, last_position).await?;
        }

        Ok(handled)
    }

    async fn wait_for_wake_or_timeout(
        &self,
        listener: &mut PgListener,
        timeout: std::time::Duration,
        shutdown: &CancellationToken,
    ) {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {}
            notification = listener.recv() => {
                if let Err(e) = notification {
                    tracing::debug!(error = %e, "listener recv failed, falling back to polling");
                }
            }
        }
    }
}

/// `read_matching`'s stream reports `dcb_core::event_store::StoreError`,
/// which wraps an opaque `Box<dyn Error>`; the runtime only ever produces
/// those from this crate's own `Error`, so this recovers the concrete type
/// for logging rather than re-wrapping it another layer deep.
fn store_error_to_sqlx(err: dcb_core::event_store::StoreError) -> sqlx::Error {
    sqlx::Error::Protocol(err.to_string())
}
