//! Core traits and in-process logic for a Dynamic Consistency Boundary
//! (DCB) event-sourcing engine.
//!
//! This crate is storage-agnostic: it defines the [`event_store::EventStore`]
//! trait plus the query, projection, command, and processor machinery built
//! on top of it, and leaves durable storage to an implementation crate
//! (see `dcb-postgres`). Most applications should depend on that
//! implementation crate directly and use the types re-exported here.
pub mod append;
pub mod clock;
pub mod command;
pub mod config;
pub mod cursor;
pub mod event;
pub mod event_store;
pub mod metrics;
pub mod processor;
pub mod projector;
pub mod query;
pub mod tag;
pub mod testing;

pub use append::{AppendCondition, DcbViolation};
pub use clock::{Clock, SystemClock, TestClock};
pub use command::{CommandError, CommandExecutor, CommandResult, Decider, ExecutionResult};
pub use config::EngineConfig;
pub use cursor::Cursor;
pub use event::{AppendEvent, StoredEvent};
pub use event_store::{AppendError, EventStore, EventStream, PersistedCommand, StoreError};
pub use metrics::{MetricSignal, MetricSink, NoopMetricSink, TracingMetricSink};
pub use processor::{
    BackoffConfig, EventHandler, LeaderStrategy, ProcessorConfig, ProcessorProgress, ProcessorStatus,
};
pub use projector::{project, project_many, ErasedProjectionResult, ErasedProjector, ProjectionResult, Projector};
pub use query::{EmptyQueryItem, Query, QueryItem};
pub use tag::{InvalidTag, Tag, TagSet};
