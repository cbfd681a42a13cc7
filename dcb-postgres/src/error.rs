//! Error types specific to the Postgres implementation.
//!
//! Grounded on the teacher's `disintegrate-postgres::error::Error`
//! (`Database`/`Deserialization`/`AppendPermit`/`QueryEventMapping`/
//! `Concurrency`), with an `Idempotent` variant added since this crate
//! separates the idempotency check from the concurrency check instead of
//! folding both into one `Concurrency` outcome.
use dcb_core::event_store::StoreError;
use dcb_core::{AppendError, DcbViolation};

/// A failure from this crate's `EventStore`/progress-store/leader-elector
/// implementations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to deserialize a stored row: {0}")]
    Deserialization(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("idempotency query already matched {0} existing event(s)")]
    Idempotent(usize),

    #[error("consistency query matched an event committed after the supplied cursor")]
    Concurrency,

    #[error("failed to acquire advisory lock for {0:?}")]
    LockUnavailable(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("event handler failed: {0}")]
    HandlerFailure(String),
}

impl From<Error> for StoreError {
    fn from(err: Error) -> Self {
        StoreError::new(err)
    }
}

impl From<Error> for AppendError {
    fn from(err: Error) -> Self {
        match err {
            Error::Idempotent(count) => AppendError::Violation(DcbViolation::IdempotencyViolation(count)),
            Error::Concurrency => AppendError::Violation(DcbViolation::ConcurrencyViolation),
            other => AppendError::Store(StoreError::new(other)),
        }
    }
}

/// Whether a `sqlx::Error` is Postgres error code `40001` (serialization
/// failure), the signal a `SERIALIZABLE` transaction uses to report write
/// skew — callers retry on this, per the teacher's own `Concurrency`
/// mapping in `event_store.rs`.
pub fn is_serialization_failure(err: &sqlx::Error) -> bool {
    matches!(
        err.as_database_error().and_then(|e| e.code()),
        Some(code) if code == "40001"
    )
}
