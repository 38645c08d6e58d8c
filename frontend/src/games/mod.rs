pub mod card_game;
pub mod wheel_game;

pub use card_game::CardGame;
pub use wheel_game::WheelGame;

use chrono::Utc;
use shared::{EventAggregate, TurnOutcome};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::client::OutcomeClient;
use crate::error::{Result, RevealError};
use crate::guard::{Admission, TurnGuard};
use crate::reconciler::SessionReconciler;
use crate::sequencer::{RevealPlan, RevealSequencer};
use crate::store::SessionStore;

/// What a finished turn hands back once the reveal has settled.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport<T> {
    pub session: u64,
    /// Exactly what the authority returned for this turn.
    pub outcome: TurnOutcome,
    pub target: T,
    /// Totals after reconciliation; `None` if that fetch failed and will be
    /// retried on the next read.
    pub aggregate: Option<EventAggregate>,
}

/// A turn between admission and the authority's answer.
///
/// Until the outcome is handed to the sequencer, dropping this sends the
/// session back to Idle and restores the speculative decrement. That covers
/// both a failed request and a turn future cancelled mid-request.
pub(crate) struct PendingTurn<'a> {
    guard: &'a TurnGuard,
    sequencer: &'a RevealSequencer,
    session: u64,
    admission: Option<Admission>,
}

impl<'a> PendingTurn<'a> {
    pub(crate) fn begin(guard: &'a TurnGuard, sequencer: &'a RevealSequencer) -> Result<Self> {
        let admission = guard.admit_turn()?;
        match sequencer.begin() {
            Ok(session) => Ok(Self {
                guard,
                sequencer,
                session,
                admission: Some(admission),
            }),
            Err(e) => {
                guard.rollback(admission);
                Err(e)
            }
        }
    }

    pub(crate) fn session(&self) -> u64 {
        self.session
    }

    /// The request failed; the turn stays retryable.
    pub(crate) fn fail(mut self) {
        if let Some(admission) = self.admission.take() {
            self.abort(admission);
        }
    }

    /// The authority answered but the outcome cannot be shown. The turn is
    /// spent on the authority's side, so the budget is only refetched.
    pub(crate) fn release(mut self) {
        self.sequencer.fail(self.session);
        drop(self.admission.take());
        self.guard.store().mark_stale();
    }

    /// Commits the outcome; the sequencer holds the admission from here on.
    pub(crate) fn play(mut self, plan: RevealPlan) -> Result<oneshot::Receiver<()>> {
        let admission = self.admission.take().ok_or(RevealError::SessionDisposed)?;
        self.sequencer.play(self.session, plan, admission)
    }

    fn abort(&self, admission: Admission) {
        self.sequencer.fail(self.session);
        self.guard.rollback(admission);
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            warn!(session = self.session, "turn dropped while waiting on the authority");
            self.abort(admission);
            // the request may still have reached the authority
            self.guard.store().mark_stale();
        }
    }
}

/// Refuses a turn when loaded event details say the event is not running.
pub(crate) fn ensure_open(store: &SessionStore) -> Result<()> {
    match store.details() {
        Some(details) if !details.is_running(Utc::now()) => {
            debug!(event_id = %details.event_id, "turn refused: event closed");
            Err(RevealError::EventClosed)
        }
        _ => Ok(()),
    }
}

/// Fetches event details into the store and runs the first reconciliation.
pub(crate) async fn load_event<C: OutcomeClient>(
    client: &C,
    reconciler: &SessionReconciler<C>,
) -> Result<EventAggregate> {
    let details = client.fetch_event_details().await.map_err(|e| {
        warn!("Failed to load event details: {}", e);
        RevealError::ReconciliationFailed(e.to_string())
    })?;
    reconciler.store().set_details(details);
    reconciler.reconcile().await
}

/// Post-settle refresh. The reveal already stands, so a failure only leaves
/// the cache stale.
pub(crate) async fn settle_totals<C: OutcomeClient>(
    reconciler: &SessionReconciler<C>,
) -> Option<EventAggregate> {
    reconciler.invalidate();
    match reconciler.reconcile().await {
        Ok(aggregate) => Some(aggregate),
        Err(e) => {
            debug!("totals left stale after turn: {}", e);
            None
        }
    }
}
