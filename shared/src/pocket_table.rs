use serde::{Deserialize, Serialize};
use validator::ValidationError;

use crate::shared_wheel_game::WHEEL_REWARDS;
use crate::validation::validate_pocket_table;

/// A reward slot on the wheel. `angle` is the wheel rotation, in degrees
/// modulo 360, at which the pointer rests on this pocket.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Pocket {
    pub outcome_id: String,
    pub angle: f64,
}

/// Pocket table as loaded from configuration. `rewards` lists every outcome
/// id the authority may issue; each needs a pocket.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PocketTableConfig {
    #[serde(default)]
    pub rewards: Vec<String>,
    pub pockets: Vec<Pocket>,
}

/// A validated, ordered pocket table. Only constructible through validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PocketTable {
    pockets: Vec<Pocket>,
}

impl PocketTable {
    pub fn from_config(config: PocketTableConfig) -> Result<Self, ValidationError> {
        validate_pocket_table(&config)?;
        log::debug!("Loaded pocket table with {} pockets", config.pockets.len());
        Ok(Self { pockets: config.pockets })
    }

    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let config: PocketTableConfig = serde_json::from_str(json).map_err(|e| {
            log::error!("Malformed pocket table: {}", e);
            ValidationError::new("malformed_pocket_table")
        })?;
        Self::from_config(config)
    }

    /// Spaces the given ids evenly over the wheel, first id at 0 degrees.
    pub fn evenly_spaced<I, S>(outcome_ids: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = outcome_ids.into_iter().map(Into::into).collect();
        let step = if ids.is_empty() { 0.0 } else { 360.0 / ids.len() as f64 };
        let pockets = ids
            .iter()
            .enumerate()
            .map(|(i, id)| Pocket { outcome_id: id.clone(), angle: step * i as f64 })
            .collect();
        Self::from_config(PocketTableConfig { rewards: ids, pockets })
    }

    /// The table matching the built-in wheel catalogue.
    pub fn default_wheel() -> Result<Self, ValidationError> {
        Self::evenly_spaced(WHEEL_REWARDS.iter().map(|reward| reward.outcome_id))
    }

    pub fn get(&self, outcome_id: &str) -> Option<&Pocket> {
        self.pockets.iter().find(|pocket| pocket.outcome_id == outcome_id)
    }

    pub fn index_of(&self, outcome_id: &str) -> Option<usize> {
        self.pockets.iter().position(|pocket| pocket.outcome_id == outcome_id)
    }

    pub fn pockets(&self) -> &[Pocket] {
        &self.pockets
    }

    pub fn len(&self) -> usize {
        self.pockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pockets.is_empty()
    }
}
