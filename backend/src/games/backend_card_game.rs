use axum::{debug_handler, extract::State, Json};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::constants::{EVENT_CLOSED_ERROR, MAX_CARD_SLOTS};
use shared::validation::validate_slot_index;
use shared::{reward_for_roll, CardDrawRequest, CardDrawResponse, TurnOutcome};

use crate::error::Error;
use crate::AppState;

/// One weighted roll per slot, then shuffled so the slot order carries no
/// information about the roll order.
fn deal(total_slots: usize) -> Vec<TurnOutcome> {
    let mut rewards: Vec<TurnOutcome> = (0..total_slots)
        .map(|_| {
            let reward = reward_for_roll(OsRng.gen_range(0.0..100.0));
            TurnOutcome::new(reward.outcome_id, reward.reward_amount)
        })
        .collect();
    rewards.shuffle(&mut OsRng);
    rewards
}

#[debug_handler]
pub async fn draw_cards(
    State(state): State<AppState>,
    Json(request): Json<CardDrawRequest>,
) -> Result<Json<CardDrawResponse>, Error> {
    if request.total_slots == 0 || request.total_slots > MAX_CARD_SLOTS {
        return Err(Error::BadRequest(format!(
            "A draw needs between 1 and {} slots",
            MAX_CARD_SLOTS
        )));
    }
    validate_slot_index(request.slot_index, request.total_slots)?;

    let mut ledger = state.ledger.lock().await;
    if !ledger.is_running() {
        return Ok(Json(CardDrawResponse {
            success: false,
            per_slot_rewards: Vec::new(),
            message: Some(EVENT_CLOSED_ERROR.to_string()),
        }));
    }

    let per_slot_rewards = deal(request.total_slots);
    let chosen = &per_slot_rewards[request.slot_index];
    ledger.credit(chosen);

    tracing::info!(
        "🃏 CARD DRAW: slot {} of {} held {} pax! 💰",
        request.slot_index,
        request.total_slots,
        chosen.reward_amount
    );

    Ok(Json(CardDrawResponse {
        success: true,
        per_slot_rewards,
        message: None,
    }))
}
