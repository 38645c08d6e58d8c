use std::env;
use std::path::PathBuf;
use std::time::Duration;

use shared::constants::{
    API_BASE_URL, CARD_FLIP_DURATION_MS, DEFAULT_CARD_SLOTS, EXTRA_ROTATIONS,
    GHOST_REVEAL_DELAY_MS, REQUEST_TIMEOUT_MS, SPIN_DURATION_MS, SUMMARY_DELAY_MS,
};
use shared::PocketTable;
use tracing::{info, warn};

use crate::error::{Result, RevealError};
use crate::sequencer::RevealTimings;

pub const BASE_URL_VAR: &str = "REWARD_API_BASE_URL";
pub const TOKEN_VAR: &str = "REWARD_API_TOKEN";
pub const TIMEOUT_VAR: &str = "REWARD_REQUEST_TIMEOUT_MS";
pub const EXTRA_ROTATIONS_VAR: &str = "REWARD_EXTRA_ROTATIONS";
pub const POCKET_TABLE_VAR: &str = "REWARD_POCKET_TABLE";
pub const CARD_SLOTS_VAR: &str = "REWARD_CARD_SLOTS";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub extra_rotations: u32,
    pub spin_duration: Duration,
    pub card_flip_duration: Duration,
    pub ghost_reveal_delay: Duration,
    pub summary_delay: Duration,
    pub card_slots: usize,
    pub pocket_table_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: API_BASE_URL.to_string(),
            auth_token: None,
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            extra_rotations: EXTRA_ROTATIONS,
            spin_duration: Duration::from_millis(SPIN_DURATION_MS),
            card_flip_duration: Duration::from_millis(CARD_FLIP_DURATION_MS),
            ghost_reveal_delay: Duration::from_millis(GHOST_REVEAL_DELAY_MS),
            summary_delay: Duration::from_millis(SUMMARY_DELAY_MS),
            card_slots: DEFAULT_CARD_SLOTS,
            pocket_table_path: None,
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", name, raw);
            None
        }
    }
}

impl EngineConfig {
    /// Reads `.env` (if present) and the process environment, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            api_base_url: env::var(BASE_URL_VAR).unwrap_or(defaults.api_base_url),
            auth_token: env::var(TOKEN_VAR).ok().filter(|token| !token.is_empty()),
            request_timeout: parsed_var::<u64>(TIMEOUT_VAR)
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            extra_rotations: parsed_var(EXTRA_ROTATIONS_VAR).unwrap_or(defaults.extra_rotations),
            card_slots: parsed_var::<usize>(CARD_SLOTS_VAR)
                .filter(|slots| *slots > 0)
                .unwrap_or(defaults.card_slots),
            pocket_table_path: env::var(POCKET_TABLE_VAR).ok().map(PathBuf::from),
            ..defaults
        }
    }

    pub fn wheel_timings(&self) -> RevealTimings {
        RevealTimings::wheel(self.spin_duration, self.summary_delay)
    }

    pub fn card_timings(&self) -> RevealTimings {
        RevealTimings::cards(self.card_flip_duration, self.ghost_reveal_delay, self.summary_delay)
    }

    /// Loads and validates the pocket table, from `pocket_table_path` when
    /// set, otherwise the built-in wheel. Any invariant failure is fatal.
    pub fn load_pocket_table(&self) -> Result<PocketTable> {
        let table = match &self.pocket_table_path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    RevealError::MappingInvariantViolation(format!(
                        "cannot read pocket table {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                PocketTable::from_json(&json)?
            }
            None => PocketTable::default_wheel()?,
        };
        info!("Pocket table ready with {} pockets", table.len());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reveal_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.extra_rotations, 5);
        assert_eq!(config.wheel_timings().animate, Duration::from_millis(3600));
        assert_eq!(config.card_timings().ghost_delay, Duration::from_millis(1000));
        assert_eq!(config.card_timings().summary_delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_default_pocket_table_loads() {
        let table = EngineConfig::default().load_pocket_table().unwrap();
        assert_eq!(table.len(), shared::WHEEL_SEGMENTS);
    }

    #[test]
    fn test_missing_pocket_table_file_fails_fast() {
        let config = EngineConfig {
            pocket_table_path: Some(PathBuf::from("/nonexistent/pockets.json")),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.load_pocket_table(),
            Err(RevealError::MappingInvariantViolation(_))
        ));
    }
}
