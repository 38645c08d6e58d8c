//! Turn Guard: the single admission point for turns.
//!
//! Admission is synchronous. The in-flight flag and the speculative budget
//! decrement are both applied before the caller reaches its first await, so
//! a second trigger is rejected deterministically.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::Rejection;
use crate::store::{lock, SessionStore, Speculation};

/// How a game variant spends its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPolicy {
    /// One turn per unit of `remaining_turns` in the shared store (wheel).
    Budgeted,
    /// Exactly one turn per game instance (cards).
    SingleShot,
}

#[derive(Debug, Default)]
struct GuardState {
    ticket: u64,
    in_flight: bool,
    spent: bool,
}

#[derive(Debug, Clone)]
pub struct TurnGuard {
    store: SessionStore,
    policy: TurnPolicy,
    state: Arc<Mutex<GuardState>>,
}

/// Proof that a turn was admitted. Dropping it ends the turn and clears the
/// in-flight flag; [`TurnGuard::rollback`] also gives the budget back.
#[derive(Debug)]
pub struct Admission {
    ticket: u64,
    speculation: Option<Speculation>,
    state: Arc<Mutex<GuardState>>,
}

impl Admission {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.ticket == self.ticket && state.in_flight {
            state.in_flight = false;
            debug!(ticket = self.ticket, "turn released");
        }
    }
}

impl TurnGuard {
    pub fn new(store: SessionStore, policy: TurnPolicy) -> Self {
        Self {
            store,
            policy,
            state: Arc::new(Mutex::new(GuardState::default())),
        }
    }

    pub fn policy(&self) -> TurnPolicy {
        self.policy
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn is_in_flight(&self) -> bool {
        lock(&self.state).in_flight
    }

    /// Whether a trigger control for this game should be enabled.
    pub fn can_admit(&self) -> bool {
        let state = lock(&self.state);
        !state.in_flight
            && match self.policy {
                TurnPolicy::Budgeted => !self.store.budget().is_exhausted(),
                TurnPolicy::SingleShot => !state.spent,
            }
    }

    pub fn admit_turn(&self) -> Result<Admission, Rejection> {
        let mut state = lock(&self.state);
        if state.in_flight {
            debug!("turn rejected: already in progress");
            return Err(Rejection::AlreadyInProgress);
        }

        let speculation = match self.policy {
            TurnPolicy::Budgeted => match self.store.take_turn() {
                Some(speculation) => Some(speculation),
                None => {
                    debug!("turn rejected: budget exhausted");
                    return Err(Rejection::BudgetExhausted);
                }
            },
            TurnPolicy::SingleShot => {
                if state.spent {
                    debug!("turn rejected: slot already chosen");
                    return Err(Rejection::BudgetExhausted);
                }
                state.spent = true;
                None
            }
        };

        state.ticket += 1;
        state.in_flight = true;
        debug!(ticket = state.ticket, "turn admitted");

        Ok(Admission {
            ticket: state.ticket,
            speculation,
            state: Arc::clone(&self.state),
        })
    }

    /// Ends a turn whose outcome never arrived: restores the speculative
    /// decrement (unless the authority has written since) and, for
    /// single-shot games, frees the slot choice again.
    pub fn rollback(&self, admission: Admission) {
        if let Some(speculation) = &admission.speculation {
            self.store.restore_turn(speculation);
        }
        if self.policy == TurnPolicy::SingleShot {
            lock(&self.state).spent = false;
        }
        debug!(ticket = admission.ticket, "turn rolled back");
        drop(admission);
    }
}
