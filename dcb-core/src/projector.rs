//! Projectors: pure folds from an event stream to application state.
//!
//! Grounded on the teacher's `Decision::process`/`State` pattern, but
//! decoupled from decision-making (§4.4 treats projection as its own
//! component, reusable by both the Command Executor and ad-hoc read
//! models) and generalized so several projectors can share a single pass
//! over the stream instead of each re-reading the log.
use futures::StreamExt;

use crate::cursor::Cursor;
use crate::event::StoredEvent;
use crate::event_store::StoreError;
use crate::query::Query;

/// The outcome of folding a matching event stream: the resulting state and
/// the cursor of the last event folded in, which becomes both a read
/// checkpoint and (when reused as `after` for a later consistency query)
/// an append condition's basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionResult<S> {
    pub state: S,
    pub cursor: Cursor,
}

/// A pure, incremental fold over events matching a fixed query.
///
/// `apply` must be deterministic and side-effect free: the runtime is free
/// to replay it from `Self::default_state()` on every invocation, or to
/// resume it from a previously checkpointed state, and both must agree.
pub trait Projector {
    type State: Clone + Send;

    /// The query whose matching events this projector folds over.
    fn query(&self) -> Query;

    /// The state before any matching event has been folded in.
    fn default_state(&self) -> Self::State;

    /// Folds one event into the running state.
    fn apply(&self, state: &mut Self::State, event: &StoredEvent);
}

/// Projects a single projector's query against `store`, reading after
/// `after`, and returns the folded state plus the cursor reached.
pub async fn project<P>(
    store: &(dyn crate::event_store::EventStore),
    projector: &P,
    after: Cursor,
) -> Result<ProjectionResult<P::State>, StoreError>
where
    P: Projector,
{
    let query = projector.query();
    let mut state = projector.default_state();
    let mut cursor = after;
    let mut stream = store.read_matching(&query, after);
    while let Some(event) = stream.next().await {
        let event = event?;
        projector.apply(&mut state, &event);
        cursor = event.cursor();
    }
    Ok(ProjectionResult { state, cursor })
}

/// Projects several projectors against `store` in a single pass over the
/// union of their queries, so decisions that depend on more than one
/// entity's state (§4.4, §8 scenario 3) don't pay for N separate stream
/// reads. Each projector only ever sees events matching its own query.
pub async fn project_many(
    store: &(dyn crate::event_store::EventStore),
    projectors: &[&dyn ErasedProjector],
    after: Cursor,
) -> Result<Vec<ErasedProjectionResult>, StoreError> {
    let union = projectors
        .iter()
        .map(|p| p.query())
        .fold(Query::none(), Query::or);

    let mut states: Vec<Box<dyn std::any::Any + Send>> =
        projectors.iter().map(|p| p.default_state_any()).collect();
    let mut cursors = vec![after; projectors.len()];

    let mut stream = store.read_matching(&union, after);
    while let Some(event) = stream.next().await {
        let event = event?;
        for (i, projector) in projectors.iter().enumerate() {
            if projector.query().matches(event.event_type(), event.tags()) {
                projector.apply_any(states[i].as_mut(), &event);
                cursors[i] = event.cursor();
            }
        }
    }

    Ok(states
        .into_iter()
        .zip(cursors)
        .map(|(state, cursor)| ErasedProjectionResult { state, cursor })
        .collect())
}

/// An owned, type-erased projection result, paired back to its concrete
/// type with [`ErasedProjectionResult::downcast`].
pub struct ErasedProjectionResult {
    state: Box<dyn std::any::Any + Send>,
    pub cursor: Cursor,
}

impl ErasedProjectionResult {
    pub fn downcast<S: 'static>(self) -> ProjectionResult<S> {
        let state = *self
            .state
            .downcast::<S>()
            .expect("downcast target must match the projector this result came from");
        ProjectionResult {
            state,
            cursor: self.cursor,
        }
    }
}

/// Object-safe counterpart of [`Projector`], used by [`project_many`] to
/// hold a heterogeneous slice of projectors behind one dynamic pass.
pub trait ErasedProjector {
    fn query(&self) -> Query;
    fn default_state_any(&self) -> Box<dyn std::any::Any + Send>;
    fn apply_any(&self, state: &mut dyn std::any::Any, event: &StoredEvent);
}

impl<P> ErasedProjector for P
where
    P: Projector,
    P::State: 'static,
{
    fn query(&self) -> Query {
        Projector::query(self)
    }

    fn default_state_any(&self) -> Box<dyn std::any::Any + Send> {
        Box::new(self.default_state())
    }

    fn apply_any(&self, state: &mut dyn std::any::Any, event: &StoredEvent) {
        let state = state
            .downcast_mut::<P::State>()
            .expect("apply_any invoked with the wrong state type");
        self.apply(state, event);
    }
}
