//! A given/when/then harness for testing [`crate::command::Decider`]
//! implementations without a store.
//!
//! Ported from the teacher's `disintegrate::testing::TestHarness`: a
//! decider's `apply`/`decide` are pure functions of state, so a decision
//! can be exercised by folding a fixed event history into the default
//! state and asserting on what `decide` returns, with no `EventStore` in
//! the loop at all.
use crate::command::Decider;
use crate::event::StoredEvent;

/// Fixes a history of events to fold before exercising a [`Decider`].
pub struct TestHarness<'d, D: Decider> {
    decider: &'d D,
    history: Vec<StoredEvent>,
}

impl<'d, D: Decider> TestHarness<'d, D> {
    /// Starts a scenario for `decider` with no prior history.
    pub fn given(decider: &'d D, history: impl IntoIterator<Item = StoredEvent>) -> Self {
        Self {
            decider,
            history: history.into_iter().collect(),
        }
    }

    /// Folds the given history and asserts `decide` returns exactly
    /// `expected` events.
    pub fn when_then(self, expected: Vec<crate::event::AppendEvent>) {
        let produced = self.run();
        assert_eq!(
            produced.expect("decide returned an error, expected events"),
            expected
        );
    }

    /// Folds the given history and asserts `decide` fails with `expected`.
    pub fn when_then_err(self, expected: D::Error)
    where
        D::Error: PartialEq + std::fmt::Debug,
    {
        let produced = self.run();
        match produced {
            Ok(events) => panic!("expected decide to fail with {expected:?}, got events {events:?}"),
            Err(actual) => assert_eq!(actual, expected),
        }
    }

    fn run(self) -> Result<Vec<crate::event::AppendEvent>, D::Error> {
        let mut state = self.decider.default_state();
        for event in &self.history {
            if self.decider.query().matches(event.event_type(), event.tags()) {
                self.decider.apply(&mut state, event);
            }
        }
        self.decider.decide(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::chrono_compat::Timestamp;
    use crate::event::AppendEvent;
    use crate::query::{Query, QueryItem};
    use crate::tag::TagSet;
    use crate::tags;

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct WalletBalance {
        opened: bool,
        balance: i64,
    }

    #[derive(Debug, thiserror::Error, PartialEq, Eq)]
    enum WalletError {
        #[error("wallet already opened")]
        AlreadyOpened,
    }

    struct OpenWallet {
        wallet_id: String,
    }

    impl crate::projector::Projector for OpenWallet {
        type State = WalletBalance;

        fn query(&self) -> Query {
            Query::single(QueryItem::of_tags(tags! { wallet_id: self.wallet_id.clone() }).unwrap())
        }

        fn default_state(&self) -> Self::State {
            WalletBalance::default()
        }

        fn apply(&self, state: &mut Self::State, event: &StoredEvent) {
            if event.event_type() == "WalletOpened" {
                state.opened = true;
            }
        }
    }

    impl Decider for OpenWallet {
        type Error = WalletError;

        fn decide(&self, state: &Self::State) -> Result<Vec<AppendEvent>, Self::Error> {
            if state.opened {
                return Err(WalletError::AlreadyOpened);
            }
            Ok(vec![AppendEvent::new(
                "WalletOpened",
                tags! { wallet_id: self.wallet_id.clone() },
                Vec::new(),
            )])
        }
    }

    fn stored(event_type: &str, tags: TagSet, position: u64) -> StoredEvent {
        StoredEvent::new(position, 1, event_type, tags, Vec::new(), Timestamp::from_millis(0))
    }

    #[test]
    fn opening_a_fresh_wallet_succeeds() {
        let decider = OpenWallet {
            wallet_id: "w1".to_string(),
        };
        TestHarness::given(&decider, []).when_then(vec![AppendEvent::new(
            "WalletOpened",
            tags! { wallet_id: "w1" },
            Vec::new(),
        )]);
    }

    #[test]
    fn opening_an_already_open_wallet_fails() {
        let decider = OpenWallet {
            wallet_id: "w1".to_string(),
        };
        TestHarness::given(&decider, [stored("WalletOpened", tags! { wallet_id: "w1" }, 1)])
            .when_then_err(WalletError::AlreadyOpened);
    }
}
