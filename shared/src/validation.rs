use std::borrow::Cow;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

use crate::pocket_table::PocketTableConfig;

const ANGLE_TOLERANCE: f64 = 1e-6;

static OUTCOME_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]{1,32}$").unwrap());

static INVITEE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").unwrap());

fn rejected(code: &'static str, field: &'static str, value: impl serde::Serialize) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.add_param(Cow::from(field), &value);
    err
}

pub fn validate_outcome_id(outcome_id: &str) -> Result<(), ValidationError> {
    if !OUTCOME_ID_PATTERN.is_match(outcome_id) {
        return Err(rejected("invalid_outcome_id", "outcome_id", outcome_id));
    }
    Ok(())
}

pub fn validate_slot_index(slot_index: usize, total_slots: usize) -> Result<(), ValidationError> {
    if slot_index >= total_slots {
        return Err(rejected("invalid_slot_index", "slot_index", slot_index));
    }
    Ok(())
}

pub fn validate_invitee(invitee: &str) -> Result<(), ValidationError> {
    if !INVITEE_PATTERN.is_match(invitee) {
        let mut err = rejected("invalid_invitee", "invitee", invitee);
        err.message = Some(Cow::from("Invitee must be 3-32 letters, digits, '.', '_' or '-'"));
        return Err(err);
    }
    Ok(())
}

/// Checks a pocket table once, before any reveal depends on it: at least one
/// pocket, well-formed unique ids, angles inside [0, 360) with no two pockets
/// sharing a position, and a pocket for every catalogue reward.
pub fn validate_pocket_table(config: &PocketTableConfig) -> Result<(), ValidationError> {
    if config.pockets.is_empty() {
        return Err(ValidationError::new("empty_pocket_table"));
    }

    let mut seen_ids = HashSet::new();
    for (i, pocket) in config.pockets.iter().enumerate() {
        validate_outcome_id(&pocket.outcome_id)?;
        if !seen_ids.insert(pocket.outcome_id.as_str()) {
            return Err(rejected("duplicate_outcome_id", "outcome_id", &pocket.outcome_id));
        }
        if !pocket.angle.is_finite() || pocket.angle < 0.0 || pocket.angle >= 360.0 {
            return Err(rejected("angle_out_of_range", "angle", pocket.angle));
        }
        let clash = config.pockets[..i]
            .iter()
            .any(|other| (other.angle - pocket.angle).abs() < ANGLE_TOLERANCE);
        if clash {
            return Err(rejected("duplicate_angle", "angle", pocket.angle));
        }
    }

    for reward in &config.rewards {
        if !seen_ids.contains(reward.as_str()) {
            log::warn!("Pocket table has no pocket for reward {}", reward);
            return Err(rejected("missing_pocket", "outcome_id", reward));
        }
    }

    Ok(())
}
