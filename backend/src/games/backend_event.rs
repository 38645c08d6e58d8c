use axum::{debug_handler, extract::State, Json};
use chrono::Utc;
use shared::constants::{ALREADY_INVITED_ERROR, EVENT_CLOSED_ERROR, INVITE_BONUS_TURNS};
use shared::validation::validate_invitee;
use shared::{EventAggregate, EventDetails, InviteRecord, InviteRequest, InviteResponse, TurnBudget};

use crate::error::Error;
use crate::AppState;

pub async fn get_budget(State(state): State<AppState>) -> Json<TurnBudget> {
    Json(state.ledger.lock().await.budget)
}

pub async fn get_aggregate(State(state): State<AppState>) -> Json<EventAggregate> {
    Json(state.ledger.lock().await.aggregate())
}

pub async fn get_details(State(state): State<AppState>) -> Json<EventDetails> {
    Json(state.ledger.lock().await.details.clone())
}

/// Grants bonus turns for inviting a new player. Each invitee counts once.
#[debug_handler]
pub async fn invite(
    State(state): State<AppState>,
    Json(request): Json<InviteRequest>,
) -> Result<Json<InviteResponse>, Error> {
    let invitee = request.invitee.trim().to_string();
    validate_invitee(&invitee)?;

    let mut ledger = state.ledger.lock().await;
    let refusal = if !ledger.is_running() {
        Some(EVENT_CLOSED_ERROR)
    } else if ledger
        .invite_history
        .iter()
        .any(|record| record.invitee.eq_ignore_ascii_case(&invitee))
    {
        Some(ALREADY_INVITED_ERROR)
    } else {
        None
    };
    if let Some(message) = refusal {
        return Ok(Json(InviteResponse {
            success: false,
            remaining_turns: ledger.budget.remaining_turns,
            message: Some(message.to_string()),
        }));
    }

    ledger.budget.remaining_turns += INVITE_BONUS_TURNS;
    ledger.budget.max_turns += INVITE_BONUS_TURNS;
    ledger.invite_history.push(InviteRecord {
        invitee: invitee.clone(),
        bonus_turns: INVITE_BONUS_TURNS,
        invited_at: Utc::now(),
    });
    tracing::info!("📨 INVITE: {} joined, +{} spin", invitee, INVITE_BONUS_TURNS);

    Ok(Json(InviteResponse {
        success: true,
        remaining_turns: ledger.budget.remaining_turns,
        message: None,
    }))
}
