//! Event payloads and their persisted form.
//!
//! The engine treats event payloads as opaque bytes (§3): it never
//! inspects, decodes, or type-checks them. Encoding/decoding of a
//! particular domain event type is the concern of a `Serde` implementation
//! layered on top (see the `dcb-serde` crate's `dcb_serde::Serde` trait),
//! never of the event log itself. This mirrors the teacher's separation
//! between
//! `Event`/`EventSchema` (domain layer) and the raw bytes a store persists,
//! except the log here never needs a compile-time event schema at all.
use chrono_compat::Timestamp;
use serde::{Deserialize, Serialize};

use crate::tag::TagSet;

/// A new event, not yet appended to the log.
///
/// `event_type` is a free-form string discriminator (e.g. `"WalletOpened"`)
/// and `payload` is the opaque, already-serialized event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEvent {
    event_type: String,
    tags: TagSet,
    payload: Vec<u8>,
}

impl AppendEvent {
    pub fn new(event_type: impl Into<String>, tags: TagSet, payload: Vec<u8>) -> Self {
        Self {
            event_type: event_type.into(),
            tags,
            payload,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// An event as it exists durably in the log, carrying its log-assigned
/// coordinates alongside the data the caller originally appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    position: u64,
    transaction_id: u64,
    event_type: String,
    tags: TagSet,
    payload: Vec<u8>,
    occurred_at: Timestamp,
}

impl StoredEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        position: u64,
        transaction_id: u64,
        event_type: impl Into<String>,
        tags: TagSet,
        payload: Vec<u8>,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            position,
            transaction_id,
            event_type: event_type.into(),
            tags,
            payload,
            occurred_at,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    pub fn cursor(&self) -> crate::cursor::Cursor {
        crate::cursor::Cursor::new(self.position, self.transaction_id)
    }
}

/// Thin wrapper so this crate does not depend directly on `chrono` in its
/// public API; `dcb-postgres` converts to/from `chrono::DateTime<Utc>` at
/// its boundary.
pub mod chrono_compat {
    use serde::{Deserialize, Serialize};

    /// Milliseconds since the Unix epoch (UTC). Storing a plain integer
    /// keeps `dcb-core` free of a hard `chrono` dependency while still
    /// giving callers enough precision to reconstruct a wall-clock time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct Timestamp(i64);

    impl Timestamp {
        pub fn from_millis(millis: i64) -> Self {
            Self(millis)
        }

        pub fn as_millis(&self) -> i64 {
            self.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_event_exposes_a_cursor() {
        let event = StoredEvent::new(
            7,
            3,
            "WalletOpened",
            TagSet::new(),
            b"payload".to_vec(),
            Timestamp::from_millis(0),
        );
        let cursor = event.cursor();
        assert_eq!(cursor.position(), 7);
        assert_eq!(cursor.transaction_id(), 3);
    }
}
