use std::sync::{Arc, Mutex};

use shared::{CardBudget, EventAggregate};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::client::OutcomeClient;
use crate::error::{Result, RevealError};
use crate::games::{ensure_open, load_event, settle_totals, PendingTurn, TurnReport};
use crate::guard::{TurnGuard, TurnPolicy};
use crate::mapper::{CardMapper, CardTarget};
use crate::reconciler::SessionReconciler;
use crate::sequencer::{PhaseDescriptor, RevealPlan, RevealSequencer, RevealTimings, SessionSnapshot};
use crate::store::{lock, SessionStore};

/// Pick-a-card envelope game. One slot may be chosen per instance; after the
/// chosen card flips, every other slot shows what it would have held.
pub struct CardGame<C: OutcomeClient> {
    client: Arc<C>,
    mapper: CardMapper,
    guard: TurnGuard,
    sequencer: RevealSequencer,
    reconciler: Arc<SessionReconciler<C>>,
    /// Slot budget of this draw. It lives here rather than in the store
    /// because the authority keeps no per-draw state to reconcile against:
    /// each draw request carries its own `total_slots`. It is written once,
    /// after the authority's draw has settled on screen.
    budget: Mutex<CardBudget>,
}

impl<C: OutcomeClient> CardGame<C> {
    pub fn new(
        client: Arc<C>,
        reconciler: Arc<SessionReconciler<C>>,
        total_slots: usize,
        timings: RevealTimings,
    ) -> Self {
        let guard = TurnGuard::new(reconciler.store().clone(), TurnPolicy::SingleShot);
        Self {
            client,
            mapper: CardMapper::new(total_slots),
            guard,
            sequencer: RevealSequencer::new(timings),
            reconciler,
            budget: Mutex::new(CardBudget::new(total_slots)),
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

    pub fn budget(&self) -> CardBudget {
        *lock(&self.budget)
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PhaseDescriptor> {
        self.sequencer.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.sequencer.snapshot()
    }

    pub fn can_pick(&self) -> bool {
        self.guard.can_admit()
    }

    pub async fn load(&self) -> Result<EventAggregate> {
        load_event(self.client.as_ref(), &self.reconciler).await
    }

    /// Chooses `slot_index`. Resolves once the chosen card has flipped; the
    /// ghost reveal and summary follow on the sequencer's timers.
    pub async fn pick(&self, slot_index: usize) -> Result<TurnReport<CardTarget>> {
        ensure_open(self.store())?;
        let total_slots = self.mapper.total_slots();
        if !self.budget().contains(slot_index) {
            return Err(RevealError::InvalidSlot { index: slot_index, total: total_slots });
        }

        let pending = PendingTurn::begin(&self.guard, &self.sequencer)?;
        let session = pending.session();

        let draw = match self.client.request_card_outcome(slot_index, total_slots).await {
            Ok(draw) => draw,
            Err(e) => {
                warn!("Card draw failed: {}", e);
                pending.fail();
                return Err(RevealError::OutcomeFetchFailed(e.to_string()));
            }
        };

        let target = match self.mapper.map(&draw) {
            Ok(target) => target,
            Err(e) => {
                error!("Aborting card reveal, draw cannot be shown: {}", e);
                pending.release();
                return Err(e);
            }
        };

        info!(
            "🃏 Card {} of {} holds {} ({})",
            slot_index, total_slots, target.chosen.outcome_id, target.chosen.reward_amount
        );
        let plan = RevealPlan::Cards {
            outcome: target.chosen.clone(),
            chosen_slot: target.chosen_slot,
            total_slots,
            ghosts: target.ghosts.clone(),
        };
        let settled = pending.play(plan)?;
        settled.await.map_err(|_| RevealError::SessionDisposed)?;
        // confirmed: the draw above is the authority's answer
        lock(&self.budget).revealed_slots = 1;

        let aggregate = settle_totals(&self.reconciler).await;
        Ok(TurnReport {
            session,
            outcome: target.chosen.clone(),
            target,
            aggregate,
        })
    }

    pub fn dismiss(&self) -> bool {
        self.sequencer.dismiss()
    }

    pub fn dispose(&self) {
        self.sequencer.dispose();
    }
}

impl<C: OutcomeClient> Drop for CardGame<C> {
    fn drop(&mut self) {
        self.sequencer.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockOutcomeClient;
    use crate::sequencer::{Phase, Target};
    use shared::{TurnBudget, TurnOutcome};
    use std::time::Duration;

    fn rewards() -> Vec<TurnOutcome> {
        vec![
            TurnOutcome::new("pax_10", 10),
            TurnOutcome::new("pax_500", 500),
            TurnOutcome::new("pax_50", 50),
        ]
    }

    fn game(client: MockOutcomeClient) -> (Arc<MockOutcomeClient>, CardGame<MockOutcomeClient>) {
        let client = Arc::new(client);
        let reconciler = Arc::new(SessionReconciler::new(Arc::clone(&client), SessionStore::new()));
        let timings = RevealTimings::cards(
            Duration::from_millis(400),
            Duration::from_millis(1000),
            Duration::from_millis(2000),
        );
        let game = CardGame::new(Arc::clone(&client), reconciler, 3, timings);
        (client, game)
    }

    #[tokio::test(start_paused = true)]
    async fn test_chosen_card_matches_server_reward() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_draw(rewards());

        let report = game.pick(1).await.unwrap();
        assert_eq!(report.outcome, TurnOutcome::new("pax_500", 500));
        assert_eq!(report.target.chosen_slot, 1);
        assert_eq!(game.snapshot().flipped, vec![false, true, false]);
        assert_eq!(game.budget().revealed_slots, 1);
        assert_eq!(report.aggregate.unwrap().total_received_reward, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ghost_reveal_shows_every_other_slot() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_draw(rewards());
        let mut descriptors = game.subscribe();

        game.pick(0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(game.snapshot().phase, Phase::Revealing);
        assert_eq!(game.snapshot().flipped, vec![true, true, true]);

        let mut ghosts = None;
        while let Ok(descriptor) = descriptors.try_recv() {
            if let Target::Ghosts { slots } = descriptor.target {
                ghosts = Some(slots);
            }
        }
        assert_eq!(
            ghosts.unwrap(),
            vec![
                (1, TurnOutcome::new("pax_500", 500)),
                (2, TurnOutcome::new("pax_50", 50)),
            ]
        );

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(game.snapshot().phase, Phase::Summarized);
        assert!(game.dismiss());
        assert_eq!(game.snapshot().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_pick_is_budget_exhausted() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_draw(rewards());
        client.push_draw(rewards());

        game.pick(2).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!game.can_pick());
        assert_eq!(game.pick(0).await.unwrap_err(), RevealError::BudgetExhausted);
        assert_eq!(client.card_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_slot_is_refused_locally() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        assert_eq!(
            game.pick(3).await.unwrap_err(),
            RevealError::InvalidSlot { index: 3, total: 3 }
        );
        assert!(game.can_pick());
        assert_eq!(client.card_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_draw_frees_the_choice() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_draw_failure("authority unavailable");
        client.push_draw(rewards());

        let err = game.pick(0).await.unwrap_err();
        assert!(matches!(err, RevealError::OutcomeFetchFailed(_)));
        assert!(game.can_pick());

        let report = game.pick(0).await.unwrap();
        assert_eq!(report.outcome, TurnOutcome::new("pax_10", 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_pick_frees_the_choice() {
        let (client, game) = game(
            MockOutcomeClient::new(TurnBudget::new(3, 3)).with_latency(Duration::from_millis(500)),
        );
        client.push_draw(rewards());

        let timed_out = tokio::time::timeout(Duration::from_millis(100), game.pick(2)).await;
        assert!(timed_out.is_err());
        assert_eq!(game.snapshot().phase, Phase::Idle);
        assert!(!game.guard().is_in_flight());
        assert!(game.can_pick());
        assert_eq!(game.budget().revealed_slots, 0);

        let report = game.pick(2).await.unwrap();
        assert_eq!(report.outcome, TurnOutcome::new("pax_50", 50));
        assert_eq!(client.card_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_draw_is_an_invariant_violation() {
        let (client, game) = game(MockOutcomeClient::new(TurnBudget::new(3, 3)));
        client.push_draw(rewards().into_iter().take(2).collect());

        let err = game.pick(0).await.unwrap_err();
        assert!(matches!(err, RevealError::MappingInvariantViolation(_)));
        assert_eq!(game.snapshot().phase, Phase::Idle);
        assert!(!game.guard().is_in_flight());
    }
}
