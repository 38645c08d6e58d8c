//! Owned container for the budget counter and the event aggregate.
//!
//! The budget counter has exactly two writers: the Turn Guard's speculative
//! decrement and the Session Reconciler's authoritative overwrite. Every
//! authoritative write bumps `revision`; a speculative rollback only applies
//! while the revision it was taken at is still current, so the authority
//! always wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{EventAggregate, EventDetails, TurnBudget};
use tracing::debug;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct StoreState {
    budget: TurnBudget,
    aggregate: Option<EventAggregate>,
    details: Option<EventDetails>,
    revision: u64,
    /// Generation of the latest fetch to start.
    started: u64,
    /// Generation of the fetch whose result is cached.
    applied: u64,
    /// Latest generation started before the last invalidation.
    invalidated: u64,
    stale: bool,
}

/// Budget taken by a speculative decrement, kept so it can be restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Speculation {
    pub prior: TurnBudget,
    pub revision: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    state: Arc<Mutex<StoreState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(budget: TurnBudget) -> Self {
        let store = Self::default();
        lock(&store.state).budget = budget;
        store
    }

    pub fn budget(&self) -> TurnBudget {
        lock(&self.state).budget
    }

    pub fn aggregate(&self) -> Option<EventAggregate> {
        lock(&self.state).aggregate.clone()
    }

    pub fn details(&self) -> Option<EventDetails> {
        lock(&self.state).details.clone()
    }

    pub fn set_details(&self, details: EventDetails) {
        lock(&self.state).details = Some(details);
    }

    pub fn revision(&self) -> u64 {
        lock(&self.state).revision
    }

    /// Overwrites budget and aggregate with the authority's values.
    pub fn apply_authoritative(&self, budget: TurnBudget, aggregate: EventAggregate) {
        let generation = self.start_fetch();
        self.apply_fetched(generation, budget, aggregate);
    }

    /// Applies the result of the fetch that [`Self::start_fetch`] numbered
    /// `generation`.
    pub(crate) fn apply_fetched(&self, generation: u64, budget: TurnBudget, aggregate: EventAggregate) {
        let mut state = lock(&self.state);
        if state.budget != budget {
            debug!(
                local = state.budget.remaining_turns,
                authoritative = budget.remaining_turns,
                "authoritative budget replaces local value"
            );
        }
        state.budget = budget;
        state.aggregate = Some(aggregate);
        state.revision += 1;
        state.applied = generation;
        state.stale = generation <= state.invalidated;
    }

    /// Marks the cached aggregate as out of date; the next read refetches.
    /// Fetches already in flight cannot make it fresh again.
    pub fn mark_stale(&self) {
        let mut state = lock(&self.state);
        state.stale = true;
        state.invalidated = state.started;
    }

    pub fn is_stale(&self) -> bool {
        let state = lock(&self.state);
        state.stale || state.aggregate.is_none()
    }

    pub(crate) fn take_turn(&self) -> Option<Speculation> {
        let mut state = lock(&self.state);
        let prior = state.budget;
        state.budget.remaining_turns = prior.remaining_turns.checked_sub(1)?;
        Some(Speculation { prior, revision: state.revision })
    }

    /// Undoes a speculative decrement unless an authoritative write landed
    /// since it was taken. Returns whether the rollback applied.
    pub(crate) fn restore_turn(&self, speculation: &Speculation) -> bool {
        let mut state = lock(&self.state);
        if state.revision != speculation.revision {
            debug!("authoritative budget landed after admission; rollback skipped");
            return false;
        }
        state.budget = speculation.prior;
        true
    }

    /// Generation of the latest fetch to start.
    pub(crate) fn generation(&self) -> u64 {
        lock(&self.state).started
    }

    /// Generation of the fetch whose result is cached.
    pub(crate) fn applied_generation(&self) -> u64 {
        lock(&self.state).applied
    }

    pub(crate) fn start_fetch(&self) -> u64 {
        let mut state = lock(&self.state);
        state.started += 1;
        state.started
    }

    /// Fresh aggregate, if it comes from a fetch that started after
    /// `generation` and nothing has invalidated it since.
    pub(crate) fn fresh_since(&self, generation: u64) -> Option<EventAggregate> {
        let state = lock(&self.state);
        if state.applied > generation && !state.stale {
            state.aggregate.clone()
        } else {
            None
        }
    }

    pub(crate) fn fresh(&self) -> Option<EventAggregate> {
        let state = lock(&self.state);
        if state.stale {
            None
        } else {
            state.aggregate.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_turn_never_underflows() {
        let store = SessionStore::with_budget(TurnBudget::new(1, 3));
        assert!(store.take_turn().is_some());
        assert_eq!(store.budget().remaining_turns, 0);
        assert!(store.take_turn().is_none());
        assert_eq!(store.budget().remaining_turns, 0);
    }

    #[test]
    fn test_rollback_restores_prior_budget() {
        let store = SessionStore::with_budget(TurnBudget::new(2, 3));
        let speculation = store.take_turn().unwrap();
        assert!(store.restore_turn(&speculation));
        assert_eq!(store.budget(), TurnBudget::new(2, 3));
    }

    #[test]
    fn test_authoritative_write_beats_rollback() {
        let store = SessionStore::with_budget(TurnBudget::new(2, 3));
        let speculation = store.take_turn().unwrap();
        store.apply_authoritative(TurnBudget::new(0, 3), EventAggregate::default());
        assert!(!store.restore_turn(&speculation));
        assert_eq!(store.budget().remaining_turns, 0);
    }

    #[test]
    fn test_staleness() {
        let store = SessionStore::new();
        assert!(store.is_stale());
        assert!(store.fresh().is_none());

        store.apply_authoritative(TurnBudget::new(1, 1), EventAggregate::default());
        assert!(!store.is_stale());
        assert!(store.fresh().is_some());
        assert!(store.fresh_since(0).is_some());
        assert!(store.fresh_since(1).is_none());

        store.mark_stale();
        assert!(store.fresh().is_none());
    }

    #[test]
    fn test_fetch_started_earlier_is_not_reused() {
        let store = SessionStore::new();
        let early = store.start_fetch();
        let seen = store.generation();
        store.apply_fetched(early, TurnBudget::new(3, 3), EventAggregate::default());
        assert!(!store.is_stale());
        assert!(store.fresh_since(seen).is_none());

        let late = store.start_fetch();
        store.apply_fetched(late, TurnBudget::new(2, 3), EventAggregate::default());
        assert!(store.fresh_since(seen).is_some());
    }

    #[test]
    fn test_fetch_in_flight_at_invalidation_stays_stale() {
        let store = SessionStore::new();
        let in_flight = store.start_fetch();
        store.mark_stale();
        store.apply_fetched(in_flight, TurnBudget::new(3, 3), EventAggregate::default());
        assert!(store.is_stale());
        assert_eq!(store.budget().remaining_turns, 3);

        let next = store.start_fetch();
        store.apply_fetched(next, TurnBudget::new(2, 3), EventAggregate::default());
        assert!(!store.is_stale());
    }
}
