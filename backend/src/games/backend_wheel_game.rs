use axum::{debug_handler, extract::State, Json};
use rand::rngs::OsRng;
use rand::Rng;
use shared::constants::{EVENT_CLOSED_ERROR, NO_TURNS_LEFT_ERROR};
use shared::shared_wheel_game::*;

use crate::AppState;

fn refused(remaining_turns: u32, message: &str) -> Json<SpinResponse> {
    Json(SpinResponse {
        success: false,
        outcome: None,
        remaining_turns,
        message: Some(message.to_string()),
        result_number: None,
    })
}

#[debug_handler]
pub async fn spin_wheel(
    State(state): State<AppState>,
    Json(_request): Json<SpinRequest>,
) -> Json<SpinResponse> {
    let mut ledger = state.ledger.lock().await;
    if !ledger.is_running() {
        return refused(ledger.budget.remaining_turns, EVENT_CLOSED_ERROR);
    }
    if ledger.budget.is_exhausted() {
        return refused(0, NO_TURNS_LEFT_ERROR);
    }

    // Roll in [0, 100) against the catalogue's cumulative weights
    let result_number = OsRng.gen_range(0.0..100.0);
    let reward = reward_for_roll(result_number);
    let outcome = TurnOutcome::new(reward.outcome_id, reward.reward_amount);

    ledger.budget.remaining_turns -= 1;
    ledger.credit(&outcome);
    let remaining_turns = ledger.budget.remaining_turns;

    tracing::info!(
        "🎡 WHEEL SPIN: rolled {:.2} and won {} pax! 💰 ({} spins left)",
        result_number,
        reward.reward_amount,
        remaining_turns
    );

    Json(SpinResponse {
        success: true,
        outcome: Some(outcome),
        remaining_turns,
        message: Some(format!(
            "You rolled {:.2} and won {} pax! 🎉",
            result_number, reward.reward_amount
        )),
        result_number: Some(result_number),
    })
}
