//! Core types for the Event Processor Runtime (§4.6–§4.9): progress
//! tracking, leader election strategy, and adaptive backoff.
//!
//! Grounded on the teacher's `PgEventListener`/`PgEventListenerConfig`
//! (per-listener row lock, retry policy, poll interval), but restructured
//! around the spec's state machine: a processor is `ACTIVE`, `PAUSED`, or
//! `FAILED`, leadership is pluggable between a single global lock and one
//! lock per processor, and idle backoff grows geometrically instead of
//! polling at a fixed interval.
use std::time::Duration;

use async_trait::async_trait;

use crate::event::chrono_compat::Timestamp;
use crate::event::StoredEvent;
use crate::query::Query;

/// The lifecycle state of one processor's progress record (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStatus {
    /// Consuming events normally.
    Active,
    /// Deliberately stopped (operator action); will not be picked up by any
    /// leader until resumed.
    Paused,
    /// Stopped itself after exceeding the configured consecutive-error
    /// threshold; requires operator intervention to resume.
    Failed,
}

/// A processor's durable checkpoint: how far it has read, its current
/// status, how many consecutive handler errors it has accumulated since
/// the last successful batch, which engine instance last claimed it
/// (§4.6 `autoRegister(instanceId)`), and the most recent handler error
/// recorded against it, if any (§4.6 `recordError(message, maxErrors)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorProgress {
    pub processor_id: String,
    pub position: u64,
    pub status: ProcessorStatus,
    pub consecutive_errors: u32,
    pub instance_id: Option<String>,
    pub last_error: Option<String>,
    pub last_error_at: Option<Timestamp>,
}

impl ProcessorProgress {
    pub fn fresh(processor_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            processor_id: processor_id.into(),
            position: 0,
            status: ProcessorStatus::Active,
            consecutive_errors: 0,
            instance_id: Some(instance_id.into()),
            last_error: None,
            last_error_at: None,
        }
    }
}

/// How a runtime decides which processors it is the leader for.
///
/// `Global` takes one advisory lock that makes its holder the leader for
/// every registered processor, suitable for a single always-on worker.
/// `PerProcessor` takes one lock per processor id, so leadership for
/// different processors can be spread across instances (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderStrategy {
    Global,
    PerProcessor,
}

/// A handler invoked once per matching event, in position order, at least
/// once (§4.9 — handlers must be idempotent; the runtime provides ordering
/// and retries, not exactly-once delivery).
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The query selecting the events this handler is subscribed to.
    fn query(&self) -> Query;

    /// A stable identifier for this processor's progress record and
    /// leadership lock.
    fn processor_id(&self) -> &str;

    async fn handle(&self, event: &StoredEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Parameters of the idle-backoff curve: `backoff(n) = min(max_skip,
/// base_skip * growth^min(n, cap))`, where `n` is the number of
/// consecutive empty polls (§5, §8's backoff-under-idle table).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
    pub growth: f64,
    pub cap: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(50),
            max: Duration::from_secs(5),
            growth: 2.0,
            cap: 10,
        }
    }
}

impl BackoffConfig {
    /// The delay to wait before the next poll, given `n` consecutive empty
    /// polls so far.
    pub fn backoff(&self, n: u32) -> Duration {
        let exponent = n.min(self.cap) as i32;
        let factor = self.growth.powi(exponent);
        let millis = (self.base.as_millis() as f64) * factor;
        let millis = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Configuration for one processor's runtime loop, distinct from the
/// handler itself so the same handler type can be registered with
/// different tuning in different deployments.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub batch_size: u32,
    pub max_consecutive_errors: u32,
    pub leader_strategy: LeaderStrategy,
    pub backoff: BackoffConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_consecutive_errors: 5,
            leader_strategy: LeaderStrategy::PerProcessor,
            backoff: BackoffConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_caps() {
        let cfg = BackoffConfig {
            base: Duration::from_millis(50),
            max: Duration::from_secs(5),
            growth: 2.0,
            cap: 10,
        };
        assert_eq!(cfg.backoff(0), Duration::from_millis(50));
        assert_eq!(cfg.backoff(1), Duration::from_millis(100));
        assert_eq!(cfg.backoff(2), Duration::from_millis(200));
        // past the cap exponent, backoff no longer grows
        assert_eq!(cfg.backoff(20), cfg.backoff(cfg.cap));
    }

    #[test]
    fn backoff_never_exceeds_max() {
        let cfg = BackoffConfig {
            base: Duration::from_millis(50),
            max: Duration::from_millis(300),
            growth: 2.0,
            cap: 10,
        };
        assert_eq!(cfg.backoff(10), Duration::from_millis(300));
    }
}
