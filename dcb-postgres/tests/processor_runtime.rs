//! Integration tests for leadership, progress tracking, and the processor
//! runtime's batch dispatch loop.
//!
//! Mirrors the teacher's `listener/tests.rs` split between lock-acquisition
//! tests and end-to-end dispatch tests. Written to be read, not run.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dcb_core::{EventHandler, ProcessorConfig, ProcessorStatus, Query, QueryItem};
use dcb_postgres::{leader, Migrator, PgProcessorRuntime, PgProgressStore};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

struct CountingHandler {
    processor_id: String,
    handled: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for CountingHandler {
    fn query(&self) -> Query {
        Query::single(QueryItem::of_types(["WalletOpened"]).unwrap())
    }

    fn processor_id(&self) -> &str {
        &self.processor_id
    }

    async fn handle(&self, _event: &dcb_core::StoredEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[sqlx::test]
async fn second_instance_cannot_acquire_a_held_per_processor_lock(pool: PgPool) {
    let guard = leader::try_acquire(&pool, dcb_core::LeaderStrategy::PerProcessor, "wallet-projector")
        .await
        .unwrap();
    assert!(guard.is_some());

    let second = leader::try_acquire(&pool, dcb_core::LeaderStrategy::PerProcessor, "wallet-projector")
        .await
        .unwrap();
    assert!(second.is_none());

    guard.unwrap().release().await.unwrap();
    let third = leader::try_acquire(&pool, dcb_core::LeaderStrategy::PerProcessor, "wallet-projector")
        .await
        .unwrap();
    assert!(third.is_some());
}

#[sqlx::test]
async fn distinct_processor_ids_do_not_contend_for_the_same_lock(pool: PgPool) {
    let a = leader::try_acquire(&pool, dcb_core::LeaderStrategy::PerProcessor, "processor-a")
        .await
        .unwrap();
    let b = leader::try_acquire(&pool, dcb_core::LeaderStrategy::PerProcessor, "processor-b")
        .await
        .unwrap();
    assert!(a.is_some());
    assert!(b.is_some());
}

#[sqlx::test]
async fn progress_advances_and_status_transitions_to_failed_past_the_error_threshold(pool: PgPool) {
    Migrator::new(&pool).run().await.unwrap();
    let progress = PgProgressStore::new(pool.clone());
    progress.auto_register("wallet-projector", "instance-1").await.unwrap();

    progress.update_progress("wallet-projector", 7).await.unwrap();
    let status = progress.get_status("wallet-projector").await.unwrap().unwrap();
    assert_eq!(status.position, 7);
    assert_eq!(status.consecutive_errors, 0);
    assert_eq!(status.instance_id.as_deref(), Some("instance-1"));

    for _ in 0..2 {
        progress.record_error("wallet-projector", "handler exploded", 3).await.unwrap();
    }
    let status = progress.get_status("wallet-projector").await.unwrap().unwrap();
    assert_eq!(status.consecutive_errors, 2);
    assert!(matches!(status.status, ProcessorStatus::Active));
    assert_eq!(status.last_error.as_deref(), Some("handler exploded"));

    let status_after_third = progress
        .record_error("wallet-projector", "handler exploded again", 3)
        .await
        .unwrap();
    assert!(matches!(status_after_third, ProcessorStatus::Failed));
}

#[sqlx::test]
async fn runtime_dispatches_matching_events_and_advances_progress(pool: PgPool) {
    Migrator::new(&pool).run().await.unwrap();
    let store = dcb_postgres::PgEventStore::new(pool.clone());
    dcb_core::EventStore::append(
        &store,
        vec![dcb_core::AppendEvent::new(
            "WalletOpened",
            dcb_core::tags! { wallet_id: "w1" },
            vec![],
        )],
    )
    .await
    .unwrap();

    let handled = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(CountingHandler {
        processor_id: "wallet-projector".to_string(),
        handled: handled.clone(),
    });

    let runtime = PgProcessorRuntime::new(pool.clone(), "instance-1", ProcessorConfig::default());
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_clone.cancel();
    });

    runtime.run(handler, shutdown).await.unwrap();

    assert_eq!(handled.load(Ordering::SeqCst), 1);
    let progress = PgProgressStore::new(pool);
    let status = progress.get_status("wallet-projector").await.unwrap().unwrap();
    assert_eq!(status.position, 1);
}
