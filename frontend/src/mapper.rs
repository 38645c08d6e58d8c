//! Outcome-to-presentation mapping. Both mappers are pure: the same outcome
//! from the same resting angle always yields the same target.

use shared::{CardDraw, PocketTable, TurnOutcome};
use tracing::error;

use crate::error::{Result, RevealError};

const FULL_TURN: f64 = 360.0;

/// Where the wheel must travel to land on an outcome's pocket.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelTarget {
    pub pocket_index: usize,
    /// Forward travel to the pocket, in (0, 360].
    pub forward_delta: f64,
    /// Full travel including the extra rotations.
    pub total_rotation: f64,
    pub start_angle: f64,
    /// Unwrapped angle the wheel rests at after the spin.
    pub resting_angle: f64,
}

/// Forward travel from `current` to `pocket_angle`, never zero or negative.
/// Re-landing on the pocket the wheel already rests on costs a full turn.
pub fn forward_delta(current: f64, pocket_angle: f64) -> f64 {
    let delta = (pocket_angle - current.rem_euclid(FULL_TURN)).rem_euclid(FULL_TURN);
    if delta <= 0.0 {
        delta + FULL_TURN
    } else {
        delta
    }
}

#[derive(Debug, Clone)]
pub struct WheelMapper {
    table: PocketTable,
    extra_rotations: u32,
}

impl WheelMapper {
    pub fn new(table: PocketTable, extra_rotations: u32) -> Self {
        Self { table, extra_rotations }
    }

    pub fn table(&self) -> &PocketTable {
        &self.table
    }

    pub fn extra_rotations(&self) -> u32 {
        self.extra_rotations
    }

    /// Maps an outcome to a wheel target starting from `resting_angle`.
    /// An outcome with no pocket is a configuration error and is never
    /// approximated by a nearby pocket.
    pub fn map(&self, outcome: &TurnOutcome, resting_angle: f64) -> Result<WheelTarget> {
        let pocket_index = self.table.index_of(&outcome.outcome_id).ok_or_else(|| {
            error!(outcome_id = %outcome.outcome_id, "outcome has no pocket on the wheel");
            RevealError::MappingInvariantViolation(format!(
                "no pocket for outcome {}",
                outcome.outcome_id
            ))
        })?;
        let pocket = &self.table.pockets()[pocket_index];

        let forward_delta = forward_delta(resting_angle, pocket.angle);
        let total_rotation = f64::from(self.extra_rotations) * FULL_TURN + forward_delta;

        Ok(WheelTarget {
            pocket_index,
            forward_delta,
            total_rotation,
            start_angle: resting_angle,
            resting_angle: resting_angle + total_rotation,
        })
    }
}

/// Reveal target of a card draw: the chosen slot plus every other slot's
/// reward for the ghost reveal, all taken verbatim from the authority.
#[derive(Debug, Clone, PartialEq)]
pub struct CardTarget {
    pub chosen_slot: usize,
    pub chosen: TurnOutcome,
    pub ghosts: Vec<(usize, TurnOutcome)>,
}

#[derive(Debug, Clone, Copy)]
pub struct CardMapper {
    total_slots: usize,
}

impl CardMapper {
    pub fn new(total_slots: usize) -> Self {
        Self { total_slots }
    }

    pub fn total_slots(&self) -> usize {
        self.total_slots
    }

    pub fn map(&self, draw: &CardDraw) -> Result<CardTarget> {
        if draw.per_slot_rewards.len() != self.total_slots {
            error!(
                expected = self.total_slots,
                got = draw.per_slot_rewards.len(),
                "card draw does not cover every slot"
            );
            return Err(RevealError::MappingInvariantViolation(format!(
                "draw has {} rewards for {} slots",
                draw.per_slot_rewards.len(),
                self.total_slots
            )));
        }
        let chosen = draw.chosen().cloned().ok_or_else(|| {
            RevealError::MappingInvariantViolation(format!(
                "chosen slot {} is outside the draw",
                draw.chosen_slot
            ))
        })?;
        let ghosts = draw
            .per_slot_rewards
            .iter()
            .enumerate()
            .filter(|(slot, _)| *slot != draw.chosen_slot)
            .map(|(slot, outcome)| (slot, outcome.clone()))
            .collect();

        Ok(CardTarget { chosen_slot: draw.chosen_slot, chosen, ghosts })
    }
}
