//! Append conditions and the violations they guard against.
use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;
use crate::query::Query;

/// How an append should be protected against concurrent and duplicate
/// writes.
///
/// `idempotency` and `consistency` are independent and both optional
/// (§3/§4.3):
///
/// - `idempotency`: if `query` already matches an event in the log, the
///   append is a no-op (the caller already did this, most likely a retried
///   command). This is checked first.
/// - `consistency`: if `query` matches any event committed after `cursor`,
///   the append is rejected — someone else changed state this decision
///   depended on.
///
/// An `AppendCondition` with both `None` is an unconditional append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendCondition {
    idempotency: Option<Query>,
    consistency: Option<(Query, Cursor)>,
}

impl AppendCondition {
    pub fn none() -> Self {
        Self::default()
    }

    /// Only guards against duplicates: reject if any event already matches
    /// `query`.
    pub fn idempotent_on(query: Query) -> Self {
        Self {
            idempotency: Some(query),
            consistency: None,
        }
    }

    /// Only guards against races: reject if any event matching `query` was
    /// committed after `cursor`.
    pub fn consistent_with(query: Query, cursor: Cursor) -> Self {
        Self {
            idempotency: None,
            consistency: Some((query, cursor)),
        }
    }

    /// Guards against both: idempotency is checked first, consistency
    /// second, matching the order `appendIf` must evaluate them in (§4.3 —
    /// a retried command must short-circuit as idempotent even if a
    /// concurrent writer would otherwise also trip the consistency check).
    pub fn idempotent_and_consistent(idempotency: Query, consistency: Query, cursor: Cursor) -> Self {
        Self {
            idempotency: Some(idempotency),
            consistency: Some((consistency, cursor)),
        }
    }

    pub fn idempotency_query(&self) -> Option<&Query> {
        self.idempotency.as_ref()
    }

    pub fn consistency_query(&self) -> Option<(&Query, Cursor)> {
        self.consistency.as_ref().map(|(q, c)| (q, *c))
    }
}

/// Why an `appendIf` was refused.
///
/// Distinct from an infrastructure failure ([`crate::event_store::StoreError`]):
/// a `DCBViolation` means the store is healthy and the append was correctly
/// rejected by the consistency protocol itself.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DcbViolation {
    /// The idempotency query already matched an existing event; the append
    /// was skipped rather than rejected outright, and the caller should
    /// treat this as success-without-effect. Carries how many events
    /// matched, so a caller logging the no-op can tell a single prior
    /// command from a query that is unexpectedly broad.
    #[error("idempotency query already matched {0} existing event(s)")]
    IdempotencyViolation(usize),

    /// The consistency query matched an event committed after the supplied
    /// cursor; the decision this append was based on is stale.
    #[error("consistency query matched an event committed after the supplied cursor")]
    ConcurrencyViolation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryItem;
    use crate::tags;

    #[test]
    fn unconditional_has_no_guards() {
        let c = AppendCondition::none();
        assert!(c.idempotency_query().is_none());
        assert!(c.consistency_query().is_none());
    }

    #[test]
    fn combined_condition_exposes_both_queries() {
        let idem = Query::single(QueryItem::of_tags(tags! { wallet_id: "w1" }).unwrap());
        let cons = Query::single(QueryItem::of_types(["Deposited"]).unwrap());
        let c = AppendCondition::idempotent_and_consistent(idem.clone(), cons.clone(), Cursor::ZERO);
        assert_eq!(c.idempotency_query(), Some(&idem));
        let (q, cursor) = c.consistency_query().unwrap();
        assert_eq!(q, &cons);
        assert_eq!(cursor, Cursor::ZERO);
    }
}
