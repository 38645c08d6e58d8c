//! Development reward authority: an in-memory event ledger behind the HTTP
//! routes the reveal engine talks to.

pub mod auth;
pub mod error;
pub mod games;
pub mod logging;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Router};
use chrono::{Duration, Utc};
use shared::constants::{DEFAULT_MAX_TURNS, EVENT_ROUTE_PREFIX, HEALTH_CHECK_ENDPOINT};
use shared::{EventAggregate, EventDetails, InviteRecord, SpinRecord, TurnBudget, TurnOutcome};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub const ADDR_VAR: &str = "REWARD_BACKEND_ADDR";
pub const MAX_TURNS_VAR: &str = "REWARD_MAX_TURNS";
pub const EVENT_TITLE_VAR: &str = "REWARD_EVENT_TITLE";
pub const TOKEN_VAR: &str = "REWARD_API_TOKEN";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub addr: SocketAddr,
    pub max_turns: u32,
    pub event_title: String,
    /// When set, every event route requires `Authorization: Bearer <token>`.
    pub api_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_turns: DEFAULT_MAX_TURNS,
            event_title: "Lucky wheel".to_string(),
            api_token: None,
        }
    }
}

impl BackendConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let addr = match env::var(ADDR_VAR) {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Ignoring invalid {}={:?}", ADDR_VAR, raw);
                defaults.addr
            }),
            Err(_) => defaults.addr,
        };
        let max_turns = env::var(MAX_TURNS_VAR)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.max_turns);

        Self {
            addr,
            max_turns,
            event_title: env::var(EVENT_TITLE_VAR).unwrap_or(defaults.event_title),
            api_token: env::var(TOKEN_VAR).ok().filter(|token| !token.is_empty()),
        }
    }

    /// An event that opened now and runs for a week.
    pub fn event_details(&self) -> EventDetails {
        let starts_at = Utc::now();
        EventDetails {
            event_id: uuid::Uuid::new_v4().to_string(),
            title: self.event_title.clone(),
            starts_at,
            ends_at: starts_at + Duration::days(7),
            max_turns: self.max_turns,
        }
    }
}

/// Authoritative state of one reward event.
#[derive(Debug)]
pub struct EventLedger {
    pub details: EventDetails,
    pub budget: TurnBudget,
    pub total_received_reward: i64,
    pub spin_history: Vec<SpinRecord>,
    pub invite_history: Vec<InviteRecord>,
}

impl EventLedger {
    pub fn new(details: EventDetails) -> Self {
        let budget = TurnBudget::new(details.max_turns, details.max_turns);
        Self {
            details,
            budget,
            total_received_reward: 0,
            spin_history: Vec::new(),
            invite_history: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.details.is_running(Utc::now())
    }

    pub fn credit(&mut self, outcome: &TurnOutcome) {
        self.total_received_reward += outcome.reward_amount;
        self.spin_history.push(SpinRecord {
            outcome_id: outcome.outcome_id.clone(),
            reward_amount: outcome.reward_amount,
            spun_at: Utc::now(),
        });
    }

    pub fn aggregate(&self) -> EventAggregate {
        EventAggregate {
            total_received_reward: self.total_received_reward,
            total_spin_left: self.budget.remaining_turns,
            spin_history: self.spin_history.clone(),
            invite_history: self.invite_history.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Mutex<EventLedger>>,
    pub api_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(details: EventDetails, api_token: Option<String>) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(EventLedger::new(details))),
            api_token: api_token.map(Arc::from),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.event_details(), config.api_token.clone())
    }
}

pub async fn health_check() -> impl IntoResponse {
    "OK"
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(vec![
            HeaderValue::from_static("http://127.0.0.1:8080"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ]);

    let event_routes = games::create_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_token));

    Router::new()
        .route(HEALTH_CHECK_ENDPOINT, get(health_check))
        .nest(EVENT_ROUTE_PREFIX, event_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
