//! The Command Executor: single-transaction orchestration of
//! project → decide → appendIf → persist-command (§4.5).
//!
//! Grounded on the teacher's `Decision` trait and `DecisionMaker::make`,
//! which already wires project→decide→append into one call; generalized
//! here to thread through the spec's explicit idempotency/consistency
//! split and to surface `CREATED` vs `IDEMPOTENT` outcomes instead of
//! collapsing an idempotency hit into a plain success.
use std::time::Instant;

use crate::append::{AppendCondition, DcbViolation};
use crate::clock::Clock;
use crate::cursor::Cursor;
use crate::event::AppendEvent;
use crate::event_store::{AppendError, EventStore, PersistedCommand, StoreError};
use crate::metrics::{MetricSignal, MetricSink};
use crate::projector::{project, Projector};

/// Whether a command produced new events or was recognized as a repeat of
/// one already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    Created,
    Idempotent,
}

/// The outcome of a successful command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub outcome: ExecutionResult,
    pub cursor: Cursor,
}

/// A decision: given projected state, either produce the events to append
/// or reject with a domain error `E`.
///
/// `Projector` supplies the read side (what state to fold); `Decider`
/// supplies the write side (what to do with that state). Splitting them
/// mirrors the teacher's separate `State`/`Decision` traits, kept apart so
/// a projector can be reused by read models that never decide anything.
pub trait Decider: Projector {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The query that must not have changed since `default_state` was
    /// projected, for this decision's consistency boundary. Defaults to the
    /// projector's own query, which is correct whenever the decision reads
    /// only the state it projects.
    fn consistency_query(&self) -> crate::query::Query {
        Projector::query(self)
    }

    /// An optional idempotency query: if it already matches an event in the
    /// log, `execute` returns [`ExecutionResult::Idempotent`] instead of
    /// running `decide` again.
    fn idempotency_query(&self) -> Option<crate::query::Query> {
        None
    }

    /// Produces the events to append given the projected state, or fails
    /// with a domain error that aborts the command without writing
    /// anything.
    fn decide(&self, state: &Self::State) -> Result<Vec<AppendEvent>, Self::Error>;
}

/// A command failed either because its own decision rejected it, because
/// the DCB protocol rejected the append it produced, or because the store
/// itself failed.
#[derive(Debug, thiserror::Error)]
pub enum CommandError<E> {
    #[error(transparent)]
    Decision(E),
    #[error(transparent)]
    Violation(#[from] DcbViolation),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives a single [`Decider`] through project→decide→appendIf→persist,
/// inside one store transaction.
pub struct CommandExecutor<'a> {
    store: &'a dyn EventStore,
    clock: &'a dyn Clock,
    metrics: &'a dyn MetricSink,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(store: &'a dyn EventStore, clock: &'a dyn Clock, metrics: &'a dyn MetricSink) -> Self {
        Self {
            store,
            clock,
            metrics,
        }
    }

    /// Executes `decider` against `command_type`/`command_payload`,
    /// persisting the command record alongside whatever events it
    /// produces.
    pub async fn execute<D>(
        &self,
        decider: &D,
        command_type: &str,
        command_payload: Vec<u8>,
    ) -> Result<CommandResult, CommandError<D::Error>>
    where
        D: Decider,
    {
        let start = Instant::now();
        self.metrics.record(MetricSignal::CommandStarted);

        let projection = project(self.store, decider, Cursor::ZERO)
            .await
            .map_err(CommandError::Store)?;

        let events = match decider.decide(&projection.state) {
            Ok(events) => events,
            Err(e) => {
                self.metrics.record(MetricSignal::CommandFailure { reason: e.to_string() });
                return Err(CommandError::Decision(e));
            }
        };

        let condition = match decider.idempotency_query() {
            Some(idempotency) => AppendCondition::idempotent_and_consistent(
                idempotency,
                decider.consistency_query(),
                projection.cursor,
            ),
            None => AppendCondition::consistent_with(decider.consistency_query(), projection.cursor),
        };

        let command = PersistedCommand {
            command_type: command_type.to_string(),
            payload: command_payload,
            occurred_at: self.clock.now(),
        };

        let (outcome, cursor) = match self
            .store
            .append_if_with_command(events, condition, Some(command))
            .await
        {
            Ok(cursor) => (ExecutionResult::Created, cursor),
            Err(AppendError::Violation(DcbViolation::IdempotencyViolation(_))) => {
                self.metrics.record(MetricSignal::AppendIdempotent);
                (ExecutionResult::Idempotent, projection.cursor)
            }
            Err(AppendError::Violation(v)) => {
                self.metrics.record(MetricSignal::AppendConcurrencyViolation);
                return Err(CommandError::Violation(v));
            }
            Err(AppendError::Store(e)) => return Err(CommandError::Store(e)),
        };

        self.metrics.record(MetricSignal::AppendCommitted);
        self.metrics.record(MetricSignal::CommandExecuted {
            created: matches!(outcome, ExecutionResult::Created),
            elapsed: start.elapsed(),
        });

        Ok(CommandResult { outcome, cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::event::StoredEvent;
    use crate::event_store::EventStream;
    use crate::metrics::NoopMetricSink;
    use crate::projector::Projector;
    use crate::query::{Query, QueryItem};
    use crate::tags;

    mockall::mock! {
        Store {}

        #[async_trait::async_trait]
        impl EventStore for Store {
            fn read_matching<'a>(&'a self, query: &'a Query, after: Cursor) -> EventStream<'a>;
            async fn append(&self, events: Vec<AppendEvent>) -> Result<Cursor, StoreError>;
            async fn append_if(&self, events: Vec<AppendEvent>, condition: AppendCondition) -> Result<Cursor, AppendError>;
            async fn current_transaction_id(&self) -> Result<u64, StoreError>;
            async fn append_if_with_command(&self, events: Vec<AppendEvent>, condition: AppendCondition, command: Option<PersistedCommand>) -> Result<Cursor, AppendError>;
        }
    }

    #[derive(Debug, thiserror::Error, PartialEq, Eq)]
    enum NeverFails {}

    struct AlwaysOpenWallet;

    impl Projector for AlwaysOpenWallet {
        type State = ();

        fn query(&self) -> Query {
            Query::single(QueryItem::of_tags(tags! { wallet_id: "w1" }).unwrap())
        }

        fn default_state(&self) {}

        fn apply(&self, _state: &mut (), _event: &StoredEvent) {}
    }

    impl Decider for AlwaysOpenWallet {
        type Error = NeverFails;

        fn decide(&self, _state: &()) -> Result<Vec<AppendEvent>, Self::Error> {
            Ok(vec![AppendEvent::new("WalletOpened", tags! { wallet_id: "w1" }, vec![])])
        }
    }

    #[tokio::test]
    async fn successful_append_reports_created() {
        let mut store = MockStore::new();
        store
            .expect_read_matching()
            .returning(|_, _| Box::pin(futures::stream::empty()));
        store
            .expect_append_if_with_command()
            .returning(|_, _, _| Ok(Cursor::new(1, 1)));

        let clock = TestClock::at(0);
        let metrics = NoopMetricSink;
        let executor = CommandExecutor::new(&store, &clock, &metrics);

        let result = executor
            .execute(&AlwaysOpenWallet, "OpenWallet", vec![])
            .await
            .unwrap();
        assert_eq!(result.outcome, ExecutionResult::Created);
        assert_eq!(result.cursor, Cursor::new(1, 1));
    }

    #[tokio::test]
    async fn idempotency_violation_is_reported_as_idempotent_outcome() {
        let mut store = MockStore::new();
        store
            .expect_read_matching()
            .returning(|_, _| Box::pin(futures::stream::empty()));
        store
            .expect_append_if_with_command()
            .returning(|_, _, _| Err(AppendError::Violation(DcbViolation::IdempotencyViolation(1))));

        let clock = TestClock::at(0);
        let metrics = NoopMetricSink;
        let executor = CommandExecutor::new(&store, &clock, &metrics);

        let result = executor
            .execute(&AlwaysOpenWallet, "OpenWallet", vec![])
            .await
            .unwrap();
        assert_eq!(result.outcome, ExecutionResult::Idempotent);
    }

    #[tokio::test]
    async fn concurrency_violation_surfaces_as_an_error() {
        let mut store = MockStore::new();
        store
            .expect_read_matching()
            .returning(|_, _| Box::pin(futures::stream::empty()));
        store
            .expect_append_if_with_command()
            .returning(|_, _, _| Err(AppendError::Violation(DcbViolation::ConcurrencyViolation)));

        let clock = TestClock::at(0);
        let metrics = NoopMetricSink;
        let executor = CommandExecutor::new(&store, &clock, &metrics);

        let result = executor.execute(&AlwaysOpenWallet, "OpenWallet", vec![]).await;
        assert!(matches!(result, Err(CommandError::Violation(DcbViolation::ConcurrencyViolation))));
    }

    #[derive(Debug, thiserror::Error, PartialEq, Eq)]
    #[error("wallet already open")]
    struct AlreadyOpen;

    struct RejectOpenWallet;

    impl Projector for RejectOpenWallet {
        type State = ();

        fn query(&self) -> Query {
            Query::single(QueryItem::of_tags(tags! { wallet_id: "w1" }).unwrap())
        }

        fn default_state(&self) {}

        fn apply(&self, _state: &mut (), _event: &StoredEvent) {}
    }

    impl Decider for RejectOpenWallet {
        type Error = AlreadyOpen;

        fn decide(&self, _state: &()) -> Result<Vec<AppendEvent>, Self::Error> {
            Err(AlreadyOpen)
        }
    }

    #[derive(Default)]
    struct RecordingMetricSink {
        signals: std::sync::Mutex<Vec<MetricSignal>>,
    }

    impl MetricSink for RecordingMetricSink {
        fn record(&self, signal: MetricSignal) {
            self.signals.lock().unwrap().push(signal);
        }
    }

    #[tokio::test]
    async fn decision_error_emits_started_and_failure_signals_before_propagating() {
        let mut store = MockStore::new();
        store
            .expect_read_matching()
            .returning(|_, _| Box::pin(futures::stream::empty()));

        let clock = TestClock::at(0);
        let metrics = RecordingMetricSink::default();
        let executor = CommandExecutor::new(&store, &clock, &metrics);

        let result = executor.execute(&RejectOpenWallet, "OpenWallet", vec![]).await;
        assert!(matches!(result, Err(CommandError::Decision(AlreadyOpen))));

        let signals = metrics.signals.lock().unwrap();
        assert!(matches!(signals[0], MetricSignal::CommandStarted));
        assert!(matches!(signals[1], MetricSignal::CommandFailure { .. }));
    }
}
