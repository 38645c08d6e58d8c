//! In-memory reward authority for tests.
//!
//! Spins and card draws are scripted ahead of time. Budget and aggregate are
//! kept the way the real authority keeps them, so reconciliation after a
//! scripted turn sees the turn applied.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use shared::constants::{INVALID_SLOT_ERROR, NO_TURNS_LEFT_ERROR};
use shared::{CardDraw, EventAggregate, EventDetails, SpinRecord, TurnBudget, TurnOutcome};

use crate::client::{ClientResult, OutcomeClient};
use crate::error::ClientError;
use crate::store::lock;

#[derive(Debug, Default)]
struct Calls {
    spin: usize,
    card: usize,
    budget: usize,
    aggregate: usize,
    details: usize,
}

#[derive(Debug)]
struct MockState {
    budget: TurnBudget,
    total_received_reward: i64,
    spin_history: Vec<SpinRecord>,
    details: EventDetails,
    spins: VecDeque<Result<TurnOutcome, String>>,
    draws: VecDeque<Result<Vec<TurnOutcome>, String>>,
    fail_reconciliation: bool,
    calls: Calls,
}

impl MockState {
    fn aggregate(&self) -> EventAggregate {
        EventAggregate {
            total_received_reward: self.total_received_reward,
            total_spin_left: self.budget.remaining_turns,
            spin_history: self.spin_history.clone(),
            invite_history: Vec::new(),
        }
    }
}

/// Event that started an hour ago and runs for another day.
pub fn running_event(max_turns: u32) -> EventDetails {
    let now = Utc::now();
    EventDetails {
        event_id: "mock-event".to_string(),
        title: "Mock reward event".to_string(),
        starts_at: now - ChronoDuration::hours(1),
        ends_at: now + ChronoDuration::days(1),
        max_turns,
    }
}

#[derive(Debug)]
pub struct MockOutcomeClient {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockOutcomeClient {
    pub fn new(budget: TurnBudget) -> Self {
        Self {
            state: Mutex::new(MockState {
                budget,
                total_received_reward: 0,
                spin_history: Vec::new(),
                details: running_event(budget.max_turns),
                spins: VecDeque::new(),
                draws: VecDeque::new(),
                fail_reconciliation: false,
                calls: Calls::default(),
            }),
            latency: None,
        }
    }

    /// Delays every request by `latency` before it is answered.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_details(self, details: EventDetails) -> Self {
        lock(&self.state).details = details;
        self
    }

    pub fn push_spin(&self, outcome: TurnOutcome) {
        lock(&self.state).spins.push_back(Ok(outcome));
    }

    /// Next spin is refused by the authority with `message`.
    pub fn push_spin_failure(&self, message: impl Into<String>) {
        lock(&self.state).spins.push_back(Err(message.into()));
    }

    pub fn push_draw(&self, per_slot_rewards: Vec<TurnOutcome>) {
        lock(&self.state).draws.push_back(Ok(per_slot_rewards));
    }

    pub fn push_draw_failure(&self, message: impl Into<String>) {
        lock(&self.state).draws.push_back(Err(message.into()));
    }

    pub fn fail_reconciliation(&self, fail: bool) {
        lock(&self.state).fail_reconciliation = fail;
    }

    /// Authority-side budget, as opposed to whatever the engine believes.
    pub fn budget(&self) -> TurnBudget {
        lock(&self.state).budget
    }

    pub fn set_budget(&self, budget: TurnBudget) {
        lock(&self.state).budget = budget;
    }

    pub fn spin_calls(&self) -> usize {
        lock(&self.state).calls.spin
    }

    pub fn card_calls(&self) -> usize {
        lock(&self.state).calls.card
    }

    pub fn budget_calls(&self) -> usize {
        lock(&self.state).calls.budget
    }

    pub fn aggregate_calls(&self) -> usize {
        lock(&self.state).calls.aggregate
    }

    pub fn details_calls(&self) -> usize {
        lock(&self.state).calls.details
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl OutcomeClient for MockOutcomeClient {
    async fn request_spin_outcome(&self) -> ClientResult<TurnOutcome> {
        self.wait().await;
        let mut state = lock(&self.state);
        state.calls.spin += 1;
        if state.budget.is_exhausted() {
            return Err(ClientError::Rejected(NO_TURNS_LEFT_ERROR.to_string()));
        }
        let outcome = match state.spins.pop_front() {
            Some(Ok(outcome)) => outcome,
            Some(Err(message)) => return Err(ClientError::Rejected(message)),
            None => return Err(ClientError::UnexpectedResponse("no scripted spin".to_string())),
        };
        state.budget.remaining_turns -= 1;
        state.total_received_reward += outcome.reward_amount;
        state.spin_history.push(SpinRecord {
            outcome_id: outcome.outcome_id.clone(),
            reward_amount: outcome.reward_amount,
            spun_at: Utc::now(),
        });
        Ok(outcome)
    }

    async fn request_card_outcome(&self, slot_index: usize, total_slots: usize) -> ClientResult<CardDraw> {
        self.wait().await;
        let mut state = lock(&self.state);
        state.calls.card += 1;
        if slot_index >= total_slots {
            return Err(ClientError::Rejected(INVALID_SLOT_ERROR.to_string()));
        }
        let per_slot_rewards = match state.draws.pop_front() {
            Some(Ok(rewards)) => rewards,
            Some(Err(message)) => return Err(ClientError::Rejected(message)),
            None => return Err(ClientError::UnexpectedResponse("no scripted draw".to_string())),
        };
        if let Some(chosen) = per_slot_rewards.get(slot_index) {
            state.total_received_reward += chosen.reward_amount;
            let record = SpinRecord {
                outcome_id: chosen.outcome_id.clone(),
                reward_amount: chosen.reward_amount,
                spun_at: Utc::now(),
            };
            state.spin_history.push(record);
        }
        Ok(CardDraw { chosen_slot: slot_index, per_slot_rewards })
    }

    async fn fetch_budget(&self) -> ClientResult<TurnBudget> {
        self.wait().await;
        let mut state = lock(&self.state);
        state.calls.budget += 1;
        if state.fail_reconciliation {
            return Err(ClientError::Failed(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(state.budget)
    }

    async fn fetch_event_aggregate(&self) -> ClientResult<EventAggregate> {
        self.wait().await;
        let mut state = lock(&self.state);
        state.calls.aggregate += 1;
        if state.fail_reconciliation {
            return Err(ClientError::Failed(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(state.aggregate())
    }

    async fn fetch_event_details(&self) -> ClientResult<EventDetails> {
        self.wait().await;
        let mut state = lock(&self.state);
        state.calls.details += 1;
        Ok(state.details.clone())
    }
}
