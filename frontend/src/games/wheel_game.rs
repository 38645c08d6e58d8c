use std::sync::Arc;

use shared::EventAggregate;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::client::OutcomeClient;
use crate::error::{Result, RevealError};
use crate::games::{ensure_open, load_event, settle_totals, PendingTurn, TurnReport};
use crate::guard::{TurnGuard, TurnPolicy};
use crate::mapper::{WheelMapper, WheelTarget};
use crate::reconciler::SessionReconciler;
use crate::sequencer::{PhaseDescriptor, RevealPlan, RevealSequencer, RevealTimings, SessionSnapshot};
use crate::store::SessionStore;

/// Spinning wheel: one turn per unit of the event's spin budget.
pub struct WheelGame<C: OutcomeClient> {
    client: Arc<C>,
    mapper: WheelMapper,
    guard: TurnGuard,
    sequencer: RevealSequencer,
    reconciler: Arc<SessionReconciler<C>>,
}

impl<C: OutcomeClient> WheelGame<C> {
    /// The reconciler (and with it the store) may be shared with other games
    /// and readers of the event totals.
    pub fn new(
        client: Arc<C>,
        reconciler: Arc<SessionReconciler<C>>,
        mapper: WheelMapper,
        timings: RevealTimings,
    ) -> Self {
        let guard = TurnGuard::new(reconciler.store().clone(), TurnPolicy::Budgeted);
        Self {
            client,
            mapper,
            guard,
            sequencer: RevealSequencer::new(timings),
            reconciler,
        }
    }

    pub fn store(&self) -> &SessionStore {
        self.reconciler.store()
    }

    pub fn guard(&self) -> &TurnGuard {
        &self.guard
    }

    pub fn sequencer(&self) -> &RevealSequencer {
        &self.sequencer
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PhaseDescriptor> {
        self.sequencer.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.sequencer.snapshot()
    }

    /// Whether the spin control should be enabled.
    pub fn can_spin(&self) -> bool {
        self.guard.can_admit()
    }

    pub async fn load(&self) -> Result<EventAggregate> {
        load_event(self.client.as_ref(), &self.reconciler).await
    }

    /// Plays one turn. Resolves once the wheel has settled on the outcome;
    /// the summary follows on the sequencer's own timers.
    pub async fn spin(&self) -> Result<TurnReport<WheelTarget>> {
        ensure_open(self.store())?;
        let pending = PendingTurn::begin(&self.guard, &self.sequencer)?;
        let session = pending.session();

        let outcome = match self.client.request_spin_outcome().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Spin request failed: {}", e);
                pending.fail();
                return Err(RevealError::OutcomeFetchFailed(e.to_string()));
            }
        };

        let target = match self.mapper.map(&outcome, self.sequencer.resting_angle()) {
            Ok(target) => target,
            Err(e) => {
                error!("Aborting spin, outcome cannot be shown: {}", e);
                pending.release();
                return Err(e);
            }
        };

        info!(
            "🎡 Spin {} landed on {} ({} total rotation)",
            session, outcome.outcome_id, target.total_rotation
        );
        let plan = RevealPlan::Wheel {
            outcome: outcome.clone(),
            from: target.start_angle,
            to: target.resting_angle,
        };
        let settled = pending.play(plan)?;
        settled.await.map_err(|_| RevealError::SessionDisposed)?;

        let aggregate = settle_totals(&self.reconciler).await;
        Ok(TurnReport { session, outcome, target, aggregate })
    }

    /// Closes the reward summary.
    pub fn dismiss(&self) -> bool {
        self.sequencer.dismiss()
    }

    pub fn dispose(&self) {
        self.sequencer.dispose();
    }
}

impl<C: OutcomeClient> Drop for WheelGame<C> {
    fn drop(&mut self) {
        self.sequencer.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockOutcomeClient;
    use crate::sequencer::Phase;
    use chrono::{Duration as ChronoDuration, Utc};
    use shared::{EventDetails, PocketTable, TurnBudget, TurnOutcome};
    use std::time::Duration;

    fn timings() -> RevealTimings {
        RevealTimings::wheel(Duration::from_millis(3600), Duration::from_millis(2000))
    }

    fn game(client: MockOutcomeClient) -> (Arc<MockOutcomeClient>, WheelGame<MockOutcomeClient>) {
        let client = Arc::new(client);
        let store = SessionStore::with_budget(client.budget());
        let reconciler = Arc::new(SessionReconciler::new(Arc::clone(&client), store));
        let table = PocketTable::evenly_spaced(["A", "B", "C", "D", "E", "F"]).unwrap();
        let game = WheelGame::new(
            Arc::clone(&client),
            reconciler,
            WheelMapper::new(table, 5),
            timings(),
        );
        (client, game)
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_shows_exactly_the_authority_outcome() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_spin(TurnOutcome::new("D", 250));

        let report = game.spin().await.unwrap();
        assert_eq!(report.outcome, TurnOutcome::new("D", 250));
        assert_eq!(report.target.total_rotation, 1980.0);
        assert_eq!(game.snapshot().phase, Phase::Settled);
        assert_eq!(game.snapshot().committed, Some(TurnOutcome::new("D", 250)));
        assert_eq!(game.sequencer().resting_angle(), 1980.0);

        let aggregate = report.aggregate.unwrap();
        assert_eq!(aggregate.total_received_reward, 250);
        assert_eq!(aggregate.total_spin_left, 2);
        assert_eq!(game.store().budget().remaining_turns, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_makes_no_network_call() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(0, 3)));
        assert!(!game.can_spin());
        assert_eq!(game.spin().await.unwrap_err(), RevealError::BudgetExhausted);
        assert_eq!(client.spin_calls(), 0);
        assert_eq!(game.snapshot().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_restores_budget_and_idles() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(2, 3)));
        client.push_spin_failure("authority unavailable");

        let err = game.spin().await.unwrap_err();
        assert!(matches!(err, RevealError::OutcomeFetchFailed(_)));
        assert!(err.is_retryable());
        assert_eq!(game.store().budget().remaining_turns, 2);
        assert_eq!(game.snapshot().phase, Phase::Idle);
        assert!(!game.guard().is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_spin_leaves_the_wheel_spinnable() {
        let (client, game) = game(
            MockOutcomeClient::new(TurnBudget::new(3, 3)).with_latency(Duration::from_millis(500)),
        );
        client.push_spin(TurnOutcome::new("B", 20));
        let mut descriptors = game.subscribe();

        let timed_out = tokio::time::timeout(Duration::from_millis(100), game.spin()).await;
        assert!(timed_out.is_err());
        assert_eq!(game.snapshot().phase, Phase::Idle);
        assert!(!game.guard().is_in_flight());
        assert_eq!(game.store().budget().remaining_turns, 3);
        assert!(game.store().is_stale());
        assert!(game.can_spin());

        let mut phases = Vec::new();
        while let Ok(descriptor) = descriptors.try_recv() {
            phases.push(descriptor.phase);
        }
        assert_eq!(phases, vec![Phase::Requesting, Phase::Idle]);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let report = game.spin().await.unwrap();
        assert_eq!(report.outcome, TurnOutcome::new("B", 20));
        assert_eq!(report.aggregate.unwrap().total_spin_left, 2);
        assert_eq!(game.store().budget().remaining_turns, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_spin_while_requesting_is_rejected() {
        let (client, game) = game(
            MockOutcomeClient::new(TurnBudget::new(3, 3)).with_latency(Duration::from_millis(300)),
        );
        client.push_spin(TurnOutcome::new("B", 20));
        client.push_spin(TurnOutcome::new("C", 50));

        let (first, second) = tokio::join!(game.spin(), game.spin());
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), RevealError::AlreadyInProgress);
        assert_eq!(client.spin_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_spin_starts_from_accumulated_angle() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_spin(TurnOutcome::new("D", 250));
        client.push_spin(TurnOutcome::new("A", 10));

        game.spin().await.unwrap();
        assert_eq!(game.spin().await.unwrap_err(), RevealError::AlreadyInProgress);
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(game.snapshot().phase, Phase::Summarized);

        let report = game.spin().await.unwrap();
        assert_eq!(report.target.start_angle, 1980.0);
        assert_eq!(report.target.total_rotation, 5.0 * 360.0 + 180.0);
        assert_eq!(report.target.resting_angle, 1980.0 + 1980.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_outcome_aborts_without_reveal() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_spin(TurnOutcome::new("jackpot", 1000));
        let mut descriptors = game.subscribe();

        let err = game.spin().await.unwrap_err();
        assert!(matches!(err, RevealError::MappingInvariantViolation(_)));
        assert!(!game.guard().is_in_flight());
        assert!(game.store().is_stale());

        let mut phases = Vec::new();
        while let Ok(descriptor) = descriptors.try_recv() {
            phases.push(descriptor.phase);
        }
        assert_eq!(phases, vec![Phase::Requesting, Phase::Idle]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_mid_animation_stops_the_turn() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_spin(TurnOutcome::new("B", 20));
        let mut descriptors = game.subscribe();

        let spin = game.spin();
        tokio::pin!(spin);
        tokio::select! {
            _ = &mut spin => panic!("spin settled before dispose"),
            _ = tokio::time::sleep(Duration::from_millis(1000)) => game.dispose(),
        }
        assert_eq!(spin.await.unwrap_err(), RevealError::SessionDisposed);
        assert!(!game.guard().is_in_flight());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut phases = Vec::new();
        while let Some(descriptor) = descriptors.recv().await {
            phases.push(descriptor.phase);
        }
        assert_eq!(phases, vec![Phase::Requesting, Phase::Animating]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_event_refuses_before_guard() {
        let now = Utc::now();
        let closed = EventDetails {
            event_id: "past".to_string(),
            title: "Past event".to_string(),
            starts_at: now - ChronoDuration::days(2),
            ends_at: now - ChronoDuration::days(1),
            max_turns: 3,
        };
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)).with_details(closed));
        game.load().await.unwrap();

        assert_eq!(game.spin().await.unwrap_err(), RevealError::EventClosed);
        assert_eq!(game.store().budget().remaining_turns, 3);
        assert_eq!(client.spin_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_reconciles_budget_from_authority() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.set_budget(TurnBudget::new(1, 3));

        let aggregate = game.load().await.unwrap();
        assert_eq!(aggregate.total_spin_left, 1);
        assert_eq!(game.store().budget().remaining_turns, 1);
        assert!(game.store().details().is_some());
        assert_eq!(client.details_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reconciliation_keeps_the_reveal() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_spin(TurnOutcome::new("E", 100));
        client.fail_reconciliation(true);

        let report = game.spin().await.unwrap();
        assert_eq!(report.outcome.reward_amount, 100);
        assert!(report.aggregate.is_none());
        assert!(game.store().is_stale());
        assert_eq!(game.store().budget().remaining_turns, 2);
    }
}
