pub const API_BASE_URL: &str = "http://127.0.0.1:3000";
pub const EVENT_ROUTE_PREFIX: &str = "/api/reward-event";
pub const SPIN_ENDPOINT: &str = "/api/reward-event/spin";
pub const CARD_DRAW_ENDPOINT: &str = "/api/reward-event/cards/draw";
pub const BUDGET_ENDPOINT: &str = "/api/reward-event/budget";
pub const AGGREGATE_ENDPOINT: &str = "/api/reward-event/aggregate";
pub const DETAILS_ENDPOINT: &str = "/api/reward-event/details";
pub const INVITE_ENDPOINT: &str = "/api/reward-event/invite";
pub const HEALTH_CHECK_ENDPOINT: &str = "/api/health_check";

pub const SPIN_DURATION_MS: u64 = 3600;
pub const CARD_FLIP_DURATION_MS: u64 = 400;
pub const GHOST_REVEAL_DELAY_MS: u64 = 1000;
pub const SUMMARY_DELAY_MS: u64 = 2000;
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

pub const EXTRA_ROTATIONS: u32 = 5;
pub const DEFAULT_CARD_SLOTS: usize = 3;
pub const DEFAULT_MAX_TURNS: u32 = 3;
pub const INVITE_BONUS_TURNS: u32 = 1;

pub const NO_TURNS_LEFT_ERROR: &str = "No spins left for this event";
pub const EVENT_CLOSED_ERROR: &str = "The reward event is not running";
pub const ALREADY_INVITED_ERROR: &str = "This player has already been invited";
pub const INVALID_SLOT_ERROR: &str = "Slot index is out of range";
pub const MAX_CARD_SLOTS: usize = 12;
