use serde::{Deserialize, Serialize};

use crate::board::{check_board, DEFAULT_TILES};
use crate::error::{EngineError, EngineResult};
use crate::fixed::Amount;
use crate::payout::HouseEdge;

pub const MAX_CLIENT_SEED_LEN: usize = 64;

/// Engine configuration, loadable from JSON. Missing fields take the defaults
/// of a 5x5 board with a 1% edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineParams {
    pub total_tiles: u8,
    pub min_hazards: u8,
    pub max_hazards: u8,
    pub min_wager: Amount,
    pub max_wager: Amount,
    pub house_edge_bps: u16,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            total_tiles: DEFAULT_TILES,
            min_hazards: 1,
            max_hazards: DEFAULT_TILES - 1,
            min_wager: Amount::from_minor(10),
            max_wager: Amount::from_minor(100_000),
            house_edge_bps: 100,
        }
    }
}

impl EngineParams {
    /// Check internal consistency and return the parsed house edge.
    pub fn validate(&self) -> EngineResult<HouseEdge> {
        let edge = HouseEdge::from_bps(self.house_edge_bps)?;
        if self.min_hazards > self.max_hazards {
            return Err(EngineError::InvalidConfig(format!(
                "min_hazards {} exceeds max_hazards {}",
                self.min_hazards, self.max_hazards
            )));
        }
        check_board(self.total_tiles, self.min_hazards)
            .and_then(|_| check_board(self.total_tiles, self.max_hazards))
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        if self.min_wager.is_zero() || self.min_wager > self.max_wager {
            return Err(EngineError::InvalidConfig(format!(
                "wager bounds {}..={} are empty or start at zero",
                self.min_wager, self.max_wager
            )));
        }
        Ok(edge)
    }

    pub fn check_hazards(&self, hazard_count: u8) -> EngineResult<()> {
        if hazard_count < self.min_hazards || hazard_count > self.max_hazards {
            return Err(EngineError::HazardCountOutOfRange {
                hazard_count,
                min: self.min_hazards,
                max: self.max_hazards,
            });
        }
        Ok(())
    }

    pub fn check_wager(&self, wager: Amount) -> EngineResult<()> {
        if wager < self.min_wager || wager > self.max_wager {
            return Err(EngineError::WagerOutOfRange {
                wager,
                min: self.min_wager,
                max: self.max_wager,
            });
        }
        Ok(())
    }
}

pub fn check_client_seed(client_seed: &str) -> EngineResult<()> {
    if client_seed.is_empty() {
        return Err(EngineError::InvalidClientSeed("must not be empty"));
    }
    if client_seed.len() > MAX_CLIENT_SEED_LEN {
        return Err(EngineError::InvalidClientSeed("longer than 64 bytes"));
    }
    Ok(())
}
