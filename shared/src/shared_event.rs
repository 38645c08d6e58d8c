use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remaining spins for the current event.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnBudget {
    pub remaining_turns: u32,
    pub max_turns: u32,
}

impl TurnBudget {
    pub fn new(remaining_turns: u32, max_turns: u32) -> Self {
        Self { remaining_turns, max_turns }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_turns == 0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpinRecord {
    pub outcome_id: String,
    pub reward_amount: i64,
    pub spun_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InviteRecord {
    pub invitee: String,
    pub bonus_turns: u32,
    pub invited_at: DateTime<Utc>,
}

/// Server-confirmed cumulative totals for the event.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct EventAggregate {
    pub total_received_reward: i64,
    pub total_spin_left: u32,
    #[serde(default)]
    pub spin_history: Vec<SpinRecord>,
    #[serde(default)]
    pub invite_history: Vec<InviteRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EventDetails {
    pub event_id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_turns: u32,
}

impl EventDetails {
    /// True while `now` falls inside `[starts_at, ends_at)`.
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteRequest {
    pub invitee: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteResponse {
    pub success: bool,
    pub remaining_turns: u32,
    pub message: Option<String>,
}
