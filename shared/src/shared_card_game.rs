use serde::{Deserialize, Serialize};
use crate::shared_wheel_game::TurnOutcome;

/// Slot budget of one envelope draw. A draw is single-shot: one slot is
/// chosen, then every slot is revealed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct CardBudget {
    pub total_slots: usize,
    pub revealed_slots: usize,
}

impl CardBudget {
    pub fn new(total_slots: usize) -> Self {
        Self { total_slots, revealed_slots: 0 }
    }

    pub fn is_untouched(&self) -> bool {
        self.revealed_slots == 0
    }

    pub fn contains(&self, slot_index: usize) -> bool {
        slot_index < self.total_slots
    }
}

/// Rewards bound to every slot of a draw, in slot order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CardDraw {
    pub chosen_slot: usize,
    pub per_slot_rewards: Vec<TurnOutcome>,
}

impl CardDraw {
    pub fn chosen(&self) -> Option<&TurnOutcome> {
        self.per_slot_rewards.get(self.chosen_slot)
    }
}

// === API Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct CardDrawRequest {
    pub slot_index: usize,
    pub total_slots: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardDrawResponse {
    pub success: bool,
    #[serde(default)]
    pub per_slot_rewards: Vec<TurnOutcome>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_budget_bounds() {
        let budget = CardBudget::new(3);
        assert!(budget.is_untouched());
        assert!(budget.contains(2));
        assert!(!budget.contains(3));
    }

    #[test]
    fn test_chosen_reward_is_read_from_the_draw() {
        let draw = CardDraw {
            chosen_slot: 1,
            per_slot_rewards: vec![
                TurnOutcome::new("pax_10", 10),
                TurnOutcome::new("pax_100", 100),
                TurnOutcome::new("pax_20", 20),
            ],
        };
        assert_eq!(draw.chosen().map(|o| o.reward_amount), Some(100));

        let short = CardDraw { chosen_slot: 4, ..draw };
        assert!(short.chosen().is_none());
    }
}
