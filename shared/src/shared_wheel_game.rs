use serde::{Deserialize, Serialize};

/// The authoritative result of one play, as issued by the reward authority.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TurnOutcome {
    pub outcome_id: String,
    pub reward_amount: i64,
    /// Optional presentation hint (a slot index or a pocket angle). The engine
    /// never uses it to decide where a reward lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_or_angle_hint: Option<f64>,
}

impl TurnOutcome {
    pub fn new(outcome_id: impl Into<String>, reward_amount: i64) -> Self {
        Self {
            outcome_id: outcome_id.into(),
            reward_amount,
            slot_or_angle_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: f64) -> Self {
        self.slot_or_angle_hint = Some(hint);
        self
    }
}

/// One entry of the wheel's reward catalogue, in wheel order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelReward {
    pub outcome_id: &'static str,
    pub reward_amount: i64,
    /// Share of the [0, 100) roll range the authority assigns to this reward.
    pub weight: f64,
}

pub const WHEEL_REWARDS: [WheelReward; 6] = [
    WheelReward { outcome_id: "pax_10", reward_amount: 10, weight: 35.0 },
    WheelReward { outcome_id: "pax_20", reward_amount: 20, weight: 25.0 },
    WheelReward { outcome_id: "pax_50", reward_amount: 50, weight: 15.0 },
    WheelReward { outcome_id: "pax_100", reward_amount: 100, weight: 12.0 },
    WheelReward { outcome_id: "pax_250", reward_amount: 250, weight: 8.0 },
    WheelReward { outcome_id: "pax_500", reward_amount: 500, weight: 5.0 },
];

pub const WHEEL_SEGMENTS: usize = WHEEL_REWARDS.len();

/// Looks up a catalogue entry by outcome id.
pub fn wheel_reward(outcome_id: &str) -> Option<&'static WheelReward> {
    WHEEL_REWARDS.iter().find(|reward| reward.outcome_id == outcome_id)
}

/// Picks the catalogue entry whose cumulative weight band contains `roll`.
/// Rolls past the last band land on the last entry.
pub fn reward_for_roll(roll: f64) -> &'static WheelReward {
    let mut upper = 0.0;
    for reward in WHEEL_REWARDS.iter() {
        upper += reward.weight;
        if roll < upper {
            return reward;
        }
    }
    &WHEEL_REWARDS[WHEEL_SEGMENTS - 1]
}

// === API Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct SpinRequest {
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpinResponse {
    pub success: bool,
    #[serde(default)]
    pub outcome: Option<TurnOutcome>,
    pub remaining_turns: u32,
    pub message: Option<String>,
    pub result_number: Option<f64>,
}
