use crate::fixed::Amount;
use crate::round::{RoundId, RoundState};

/// Coarse classification of an [`EngineError`], used by front ends to pick a
/// response without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    NotFound,
    Unauthorized,
    InvalidState,
    /// Round creation could not obtain secure randomness.
    Fatal,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("hazard count {hazard_count} outside allowed range {min}..={max}")]
    HazardCountOutOfRange { hazard_count: u8, min: u8, max: u8 },
    #[error("wager {wager} outside allowed range {min}..={max}")]
    WagerOutOfRange {
        wager: Amount,
        min: Amount,
        max: Amount,
    },
    #[error("invalid client seed: {0}")]
    InvalidClientSeed(&'static str),
    #[error("invalid board: {hazard_count} hazards on {total_tiles} tiles")]
    InvalidBoard { total_tiles: u8, hazard_count: u8 },
    #[error("{picks} picks exceed the {safe_tiles} safe tiles on the board")]
    TooManyPicks { picks: u8, safe_tiles: u8 },
    #[error("house edge of {bps} basis points must be below 10000")]
    HouseEdgeTooHigh { bps: u16 },
    #[error("payout of {wager} at the best multiplier does not fit the amount range")]
    PayoutOverflow { wager: Amount },
    #[error("malformed {field}: expected 64 hex characters")]
    MalformedHex { field: &'static str },
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error("round {round_id} not found")]
    RoundNotFound { round_id: RoundId },
    #[error("round {round_id} belongs to another owner")]
    Unauthorized { round_id: RoundId },
    #[error("owner already has active round {round_id}")]
    RoundAlreadyActive { round_id: RoundId },
    #[error("round {round_id} is {state}, not active")]
    RoundNotActive { round_id: RoundId, state: RoundState },
    #[error("tile {tile} already revealed")]
    TileAlreadyRevealed { tile: u8 },
    #[error("tile {tile} outside board of {total_tiles} tiles")]
    TileOutOfRange { tile: u32, total_tiles: u8 },
    #[error("round {round_id} has no safe reveals to cash out")]
    NoRevealsYet { round_id: RoundId },
    #[error("secure randomness unavailable: {0}")]
    EntropyUnavailable(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::HazardCountOutOfRange { .. }
            | EngineError::WagerOutOfRange { .. }
            | EngineError::InvalidClientSeed(_)
            | EngineError::InvalidBoard { .. }
            | EngineError::TooManyPicks { .. }
            | EngineError::HouseEdgeTooHigh { .. }
            | EngineError::PayoutOverflow { .. }
            | EngineError::MalformedHex { .. }
            | EngineError::InvalidConfig(_)
            | EngineError::TileOutOfRange { .. } => ErrorKind::InvalidParameter,
            EngineError::RoundNotFound { .. } => ErrorKind::NotFound,
            EngineError::Unauthorized { .. } => ErrorKind::Unauthorized,
            EngineError::RoundAlreadyActive { .. }
            | EngineError::RoundNotActive { .. }
            | EngineError::TileAlreadyRevealed { .. }
            | EngineError::NoRevealsYet { .. } => ErrorKind::InvalidState,
            EngineError::EntropyUnavailable(_) => ErrorKind::Fatal,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
