//! The `EventStore` trait: the engine's one abstraction over durable
//! storage.
//!
//! Grounded on the teacher's `EventStore<ID, E>` trait (`stream`/`append`/
//! `append_without_validation`), but reshaped around the spec's dynamic
//! `Query`/`AppendCondition` model instead of a compile-time `StreamQuery<E>`,
//! and split into the operations §4.1 assigns to the Event Log component:
//! unconditional append, conditional `appendIf`, a matching read, the
//! current transaction id, and command-log persistence — all of which must
//! be composable inside one externally-driven transaction (§4.5 needs the
//! Command Executor to project, decide, `appendIf`, and persist the
//! command in a single atomic unit).
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::append::{AppendCondition, DcbViolation};
use crate::cursor::Cursor;
use crate::event::{AppendEvent, StoredEvent};
use crate::query::Query;

/// Infrastructure failure talking to the store: connection loss, a
/// constraint violation the protocol didn't anticipate, serialization
/// failure surfaced by the database's own concurrency control, and so on.
/// Distinct from a [`DcbViolation`], which is the protocol working exactly
/// as designed.
#[derive(Debug, thiserror::Error)]
#[error("event store error: {0}")]
pub struct StoreError(#[source] pub Box<dyn std::error::Error + Send + Sync + 'static>);

impl StoreError {
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(source))
    }
}

/// An append accepted, rejected by the DCB protocol, or failed at the
/// infrastructure layer.
#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error(transparent)]
    Violation(#[from] DcbViolation),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A stream of events read from the log in position order.
pub type EventStream<'a> = BoxStream<'a, Result<StoredEvent, StoreError>>;

/// A command accepted by a [`crate::command::CommandExecutor`], persisted
/// alongside the events it produced for audit and idempotency lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedCommand {
    pub command_type: String,
    pub payload: Vec<u8>,
    pub occurred_at: crate::event::chrono_compat::Timestamp,
}

/// The durable event log plus the command log and transactional envelope
/// the rest of the engine is built on top of.
///
/// Implementations must guarantee at least READ COMMITTED isolation for
/// plain reads, and must serialize `append_if` such that two concurrent
/// callers racing on overlapping queries cannot both succeed (§5) — in
/// practice this means running the idempotency check, the consistency
/// check, and the insert inside one transaction under a mode that detects
/// write skew (e.g. Postgres `SERIALIZABLE`, retried on `40001`).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Reads all events matching `query`, strictly after `after` (exclusive),
    /// in position order. Passing [`Cursor::ZERO`] reads from the start of
    /// the log.
    fn read_matching<'a>(&'a self, query: &'a Query, after: Cursor) -> EventStream<'a>;

    /// Appends `events` unconditionally, returning the cursor of the last
    /// event written.
    async fn append(&self, events: Vec<AppendEvent>) -> Result<Cursor, StoreError>;

    /// Appends `events` only if `condition` is satisfied, atomically with
    /// the checks it describes (§4.3): idempotency is evaluated first, then
    /// consistency, then the insert — all inside one transaction.
    ///
    /// An idempotency hit is reported as an error rather than folded into a
    /// success cursor, so callers can distinguish "nothing was written
    /// because this already happened" from "this is the first time"; the
    /// Command Executor (§4.5) is the layer that turns the former into a
    /// successful no-op result.
    async fn append_if(
        &self,
        events: Vec<AppendEvent>,
        condition: AppendCondition,
    ) -> Result<Cursor, AppendError>;

    /// The transaction id that would be assigned to an append happening
    /// right now, used by a Command Executor to build a consistency cursor
    /// without having appended anything yet.
    async fn current_transaction_id(&self) -> Result<u64, StoreError>;

    /// Appends `events` under `condition`, exactly like `append_if`, and —
    /// only if the append itself commits — persists `command` in the same
    /// transaction. This is the single operation the Command Executor
    /// (§4.5) drives: project, decide, then one call here to make the
    /// append and the command record atomic with each other, rather than
    /// two separate round-trips that could commit one without the other.
    async fn append_if_with_command(
        &self,
        events: Vec<AppendEvent>,
        condition: AppendCondition,
        command: Option<PersistedCommand>,
    ) -> Result<Cursor, AppendError>;
}
