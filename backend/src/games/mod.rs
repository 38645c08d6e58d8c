pub mod backend_card_game;
pub mod backend_event;
pub mod backend_wheel_game;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

/// Routes nested under `/api/reward-event`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/spin", post(backend_wheel_game::spin_wheel))
        .route("/cards/draw", post(backend_card_game::draw_cards))
        .route("/budget", get(backend_event::get_budget))
        .route("/aggregate", get(backend_event::get_aggregate))
        .route("/details", get(backend_event::get_details))
        .route("/invite", post(backend_event::invite))
}
