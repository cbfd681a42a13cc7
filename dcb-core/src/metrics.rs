//! Metric signal emission.
//!
//! The teacher's library has no metrics layer of its own (it logs nothing
//! and emits nothing beyond `Result`s); this module is the ambient
//! observability surface the spec's external-interfaces section calls for,
//! built the way the rest of the engine is: a small trait a caller can
//! swap out, with a no-op default so nothing is forced on an embedder that
//! doesn't want it.
use std::time::Duration;

/// A signal the engine can emit. Kept as a closed enum (rather than a
/// free-form string name) so a `MetricSink` implementation can match
/// exhaustively and the compiler catches a forgotten signal if one is
/// added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricSignal {
    /// A command began executing, before its state is projected or its
    /// decision is made.
    CommandStarted,
    /// An `appendIf` call was rejected for idempotency.
    AppendIdempotent,
    /// An `appendIf` call was rejected for a concurrency violation.
    AppendConcurrencyViolation,
    /// An `appendIf` call committed new events.
    AppendCommitted,
    /// A command executed, with its outcome and how long it took.
    CommandExecuted { created: bool, elapsed: Duration },
    /// A command's decision step rejected it with a domain error.
    CommandFailure { reason: String },
    /// A processor advanced its cursor after handling a batch.
    ProcessorProgressed { events_handled: usize },
    /// A processor's handler returned an error.
    ProcessorHandlerError,
    /// A processor transitioned between statuses (see
    /// [`crate::processor::ProcessorStatus`]).
    ProcessorStatusChanged,
    /// Leadership for a processor was acquired or lost.
    LeadershipChanged { acquired: bool },
}

/// A sink for [`MetricSignal`]s. Implementations typically forward to a
/// metrics backend (statsd, Prometheus, OpenTelemetry); `dcb-core` makes no
/// assumption about which.
pub trait MetricSink: Send + Sync {
    fn record(&self, signal: MetricSignal);
}

/// A sink that discards every signal, used when no metrics backend is
/// wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricSink;

impl MetricSink for NoopMetricSink {
    fn record(&self, _signal: MetricSignal) {}
}

/// A sink that forwards every signal to `tracing` at debug level, useful
/// as a cheap default when a caller wants visibility without wiring a real
/// metrics backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricSink;

impl MetricSink for TracingMetricSink {
    fn record(&self, signal: MetricSignal) {
        tracing::debug!(?signal, "metric signal");
    }
}
