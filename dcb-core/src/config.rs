//! Engine configuration.
//!
//! Kept as a plain, `Default`-implementing struct rather than a
//! config-file framework, matching the teacher's own style of
//! configuration-as-a-builder (`PgEventListenerConfig`) over something
//! like `config`/`figment`; an embedder free to deserialize this from
//! whatever source it already uses (env, file, flags) via `serde`.
use serde::{Deserialize, Serialize};

use crate::processor::{BackoffConfig, LeaderStrategy};

/// The isolation level an `appendIf` transaction runs under. `Serializable`
/// is the only level that, on its own, detects the write skew a naive
/// consistency check can miss; `ReadCommitted`/`RepeatableRead` are offered
/// for stores that additionally take an explicit serializing lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Top-level engine configuration, threading through to both the Command
/// Executor and the Event Processor Runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether `CommandExecutor::execute` persists a command-log record
    /// alongside the events it appends. Disabling this drops audit/replay
    /// of command payloads but not idempotency guarded purely by event
    /// tags.
    pub persist_commands: bool,
    pub transaction_isolation: IsolationLevel,
    pub processor: ProcessorRuntimeConfig,
    pub leader: LeaderStrategy,
    /// A stable identifier for this engine instance, used to tag advisory
    /// locks and log lines so operators can tell which process is leading
    /// which processor.
    pub instance_id: String,
}

/// The processor-runtime portion of [`EngineConfig`], separated out so it
/// can be reused by [`crate::processor::ProcessorConfig`] without
/// duplicating field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorRuntimeConfig {
    pub batch_size: u32,
    pub max_errors: u32,
    pub base_skip_millis: u64,
    pub growth: f64,
    pub max_skip_millis: u64,
}

impl Default for ProcessorRuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_errors: 5,
            base_skip_millis: 50,
            growth: 2.0,
            max_skip_millis: 5_000,
        }
    }
}

impl From<&ProcessorRuntimeConfig> for BackoffConfig {
    fn from(cfg: &ProcessorRuntimeConfig) -> Self {
        BackoffConfig {
            base: std::time::Duration::from_millis(cfg.base_skip_millis),
            max: std::time::Duration::from_millis(cfg.max_skip_millis),
            growth: cfg.growth,
            cap: 10,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persist_commands: true,
            transaction_isolation: IsolationLevel::Serializable,
            processor: ProcessorRuntimeConfig::default(),
            leader: LeaderStrategy::PerProcessor,
            instance_id: "dcb-engine".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_serializable_and_persists_commands() {
        let cfg = EngineConfig::default();
        assert!(cfg.persist_commands);
        assert_eq!(cfg.transaction_isolation, IsolationLevel::Serializable);
    }

    #[test]
    fn backoff_config_derives_from_runtime_config() {
        let runtime = ProcessorRuntimeConfig::default();
        let backoff: BackoffConfig = (&runtime).into();
        assert_eq!(backoff.base.as_millis(), 50);
        assert_eq!(backoff.max.as_millis(), 5_000);
    }
}
