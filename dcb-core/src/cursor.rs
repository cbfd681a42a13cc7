//! Read/consistency cursors.
//!
//! A [`Cursor`] pins a point in the event log. Unlike a per-aggregate
//! version number, it is global: `position` is the monotonic (gap-allowed)
//! sequence of the log itself, and `transaction_id` disambiguates events
//! written in the same database transaction so a reader can tell "already
//! committed when I read" from "committed concurrently with my read".
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A position in the event log plus the id of the transaction that wrote
/// it, used both as a read checkpoint (projector output) and as a
/// consistency boundary (append condition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    position: u64,
    transaction_id: u64,
}

impl Cursor {
    /// The cursor before any event has ever been appended.
    pub const ZERO: Cursor = Cursor {
        position: 0,
        transaction_id: 0,
    };

    pub fn new(position: u64, transaction_id: u64) -> Self {
        Self {
            position,
            transaction_id,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    /// Whether an event at `position`/`transaction_id` lies strictly after
    /// this cursor. Comparison is primarily by `position`; `transaction_id`
    /// only breaks ties between events committed in the same transaction,
    /// where position alone cannot express "wrote before/after" since both
    /// share one commit.
    pub fn is_before(&self, position: u64, transaction_id: u64) -> bool {
        match self.position.cmp(&position) {
            Ordering::Less => true,
            Ordering::Equal => self.transaction_id < transaction_id,
            Ordering::Greater => false,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.position
            .cmp(&other.position)
            .then_with(|| self.transaction_id.cmp(&other.transaction_id))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.position, self.transaction_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_before_everything_nonzero() {
        assert!(Cursor::ZERO.is_before(1, 1));
        assert!(!Cursor::ZERO.is_before(0, 0));
    }

    #[test]
    fn ordering_is_primarily_by_position() {
        let a = Cursor::new(5, 100);
        let b = Cursor::new(6, 1);
        assert!(a < b);
    }

    #[test]
    fn ties_broken_by_transaction_id() {
        let a = Cursor::new(5, 1);
        let b = Cursor::new(5, 2);
        assert!(a < b);
        assert!(a.is_before(5, 2));
        assert!(!b.is_before(5, 1));
    }

    #[test]
    fn equal_position_and_tx_is_not_before() {
        let a = Cursor::new(5, 1);
        assert!(!a.is_before(5, 1));
    }
}
