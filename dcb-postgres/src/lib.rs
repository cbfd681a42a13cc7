//! PostgreSQL-backed implementation of the DCB event store, command log,
//! progress store and event-processor runtime.
//!
//! Not for direct use; refer to the `dcb-core` crate for the traits and
//! types this crate implements against.
pub mod error;
pub mod event_store;
pub mod leader;
pub mod management;
pub mod migrator;
pub mod processor_runtime;
pub mod progress_store;

pub use error::Error;
pub use event_store::PgEventStore;
pub use leader::{try_acquire, LeaderGuard};
pub use management::ProcessorManagement;
pub use migrator::Migrator;
pub use processor_runtime::PgProcessorRuntime;
pub use progress_store::PgProgressStore;
