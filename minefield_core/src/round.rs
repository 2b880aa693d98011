use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::{check_board, TileSet};
use crate::error::{EngineError, EngineResult};
use crate::fixed::Amount;
use crate::payout::{multiplier_table, HouseEdge, Ratio};
use crate::permutation::derive_hazard_set;
use crate::seed::{SeedCommitment, SeedHash};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        OwnerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        OwnerId(value.to_string())
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(Uuid);

impl RoundId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        RoundId(Uuid::new_v4())
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RoundId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(RoundId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundState {
    Active,
    Won,
    Lost,
}

impl RoundState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RoundState::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundState::Active => "ACTIVE",
            RoundState::Won => "WON",
            RoundState::Lost => "LOST",
        }
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(RoundState::Active),
            "WON" => Ok(RoundState::Won),
            "LOST" => Ok(RoundState::Lost),
            other => Err(EngineError::InvalidConfig(format!("unknown round state {other:?}"))),
        }
    }
}

/// What the owner may see of a round. Never carries the server seed or the
/// hazard layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round_id: RoundId,
    pub owner_id: OwnerId,
    pub server_seed_hash: SeedHash,
    pub client_seed: String,
    pub nonce: u64,
    pub hazard_count: u8,
    pub total_tiles: u8,
    pub safe_tiles_remaining: u8,
    pub wager: Amount,
    pub multiplier_table: Vec<Ratio>,
    pub revealed_tiles: Vec<u8>,
    pub current_multiplier: Option<Ratio>,
    pub started_at: DateTime<Utc>,
}

/// Everything a third party needs to recompute the round, released only once
/// the round has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDisclosure {
    pub server_seed: String,
    pub server_seed_hash: SeedHash,
    pub client_seed: String,
    pub nonce: u64,
    pub total_tiles: u8,
    pub hazard_count: u8,
    pub hazard_positions: Vec<u8>,
}

/// Terminal result handed to the balance ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub round_id: RoundId,
    pub owner_id: OwnerId,
    pub state: RoundState,
    pub wager: Amount,
    pub multiplier: Ratio,
    pub payout: Amount,
    pub picks: Vec<u8>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevealKind {
    Safe,
    HazardHit,
    BoardCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealOutcome {
    pub round_id: RoundId,
    pub kind: RevealKind,
    pub tile: u8,
    pub revealed_tiles: Vec<u8>,
    pub current_multiplier: Ratio,
    pub safe_tiles_remaining: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclosure: Option<SeedDisclosure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashOutOutcome {
    pub round_id: RoundId,
    pub payout: Amount,
    pub picks: Vec<u8>,
    pub current_multiplier: Ratio,
    pub disclosure: SeedDisclosure,
    pub settlement: Settlement,
}

/// A single wagering round.
///
/// Transitions never mutate in place: [`Round::reveal`] and
/// [`Round::cash_out`] return the successor round, which the caller stores
/// with a single assignment.
#[derive(Clone)]
pub struct Round {
    id: RoundId,
    owner: OwnerId,
    commitment: SeedCommitment,
    client_seed: String,
    nonce: u64,
    hazard_count: u8,
    total_tiles: u8,
    hazards: TileSet,
    revealed: Vec<u8>,
    revealed_set: TileSet,
    wager: Amount,
    multiplier_table: Vec<Ratio>,
    state: RoundState,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

// Hazards and the seed stay out of logs and panic messages.
impl fmt::Debug for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Round")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("server_seed_hash", &self.commitment.server_seed_hash())
            .field("nonce", &self.nonce)
            .field("hazard_count", &self.hazard_count)
            .field("total_tiles", &self.total_tiles)
            .field("hazards", &"<redacted>")
            .field("revealed", &self.revealed)
            .field("wager", &self.wager)
            .field("state", &self.state)
            .field("started_at", &self.started_at)
            .field("ended_at", &self.ended_at)
            .finish_non_exhaustive()
    }
}

impl Round {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: OwnerId,
        commitment: SeedCommitment,
        client_seed: String,
        nonce: u64,
        wager: Amount,
        hazard_count: u8,
        total_tiles: u8,
        edge: HouseEdge,
    ) -> EngineResult<Self> {
        check_board(total_tiles, hazard_count)?;
        // Placement is fixed here, before the owner can act.
        let hazards = derive_hazard_set(
            commitment.server_seed(),
            &client_seed,
            nonce,
            total_tiles,
            hazard_count,
        );
        let multiplier_table = multiplier_table(hazard_count, total_tiles, edge)?;
        if let Some(best) = multiplier_table.last() {
            wager.apply(*best)?;
        }
        Ok(Self {
            id: RoundId::new(),
            owner,
            commitment,
            client_seed,
            nonce,
            hazard_count,
            total_tiles,
            hazards,
            revealed: Vec::new(),
            revealed_set: TileSet::empty(),
            wager,
            multiplier_table,
            state: RoundState::Active,
            started_at: Utc::now(),
            ended_at: None,
        })
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hazard_count(&self) -> u8 {
        self.hazard_count
    }

    pub fn total_tiles(&self) -> u8 {
        self.total_tiles
    }

    pub fn wager(&self) -> Amount {
        self.wager
    }

    pub fn server_seed_hash(&self) -> SeedHash {
        self.commitment.server_seed_hash()
    }

    pub fn client_seed(&self) -> &str {
        &self.client_seed
    }

    pub fn revealed_tiles(&self) -> &[u8] {
        &self.revealed
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn safe_tiles(&self) -> u8 {
        self.total_tiles - self.hazard_count
    }

    pub fn safe_tiles_remaining(&self) -> u8 {
        self.safe_tiles() - self.revealed.len() as u8
    }

    /// `None` until the first safe reveal.
    pub fn current_multiplier(&self) -> Option<Ratio> {
        self.revealed
            .len()
            .checked_sub(1)
            .and_then(|i| self.multiplier_table.get(i))
            .copied()
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            round_id: self.id,
            owner_id: self.owner.clone(),
            server_seed_hash: self.server_seed_hash(),
            client_seed: self.client_seed.clone(),
            nonce: self.nonce,
            hazard_count: self.hazard_count,
            total_tiles: self.total_tiles,
            safe_tiles_remaining: self.safe_tiles_remaining(),
            wager: self.wager,
            multiplier_table: self.multiplier_table.clone(),
            revealed_tiles: self.revealed.clone(),
            current_multiplier: self.current_multiplier(),
            started_at: self.started_at,
        }
    }

    fn disclosure(&self) -> SeedDisclosure {
        debug_assert!(self.state.is_terminal());
        SeedDisclosure {
            server_seed: self.commitment.server_seed().to_hex(),
            server_seed_hash: self.server_seed_hash(),
            client_seed: self.client_seed.clone(),
            nonce: self.nonce,
            total_tiles: self.total_tiles,
            hazard_count: self.hazard_count,
            hazard_positions: self.hazards.to_vec(),
        }
    }

    fn finish(&mut self, state: RoundState, multiplier: Ratio, payout: Amount) -> Settlement {
        let ended_at = Utc::now();
        self.state = state;
        self.ended_at = Some(ended_at);
        Settlement {
            round_id: self.id,
            owner_id: self.owner.clone(),
            state,
            wager: self.wager,
            multiplier,
            payout,
            picks: self.revealed.clone(),
            started_at: self.started_at,
            ended_at,
        }
    }

    fn check_access(&self, owner: &OwnerId) -> EngineResult<()> {
        if &self.owner != owner {
            return Err(EngineError::Unauthorized { round_id: self.id });
        }
        if self.state.is_terminal() {
            return Err(EngineError::RoundNotActive {
                round_id: self.id,
                state: self.state,
            });
        }
        Ok(())
    }

    pub fn reveal(&self, owner: &OwnerId, tile: u32) -> EngineResult<(Round, RevealOutcome)> {
        self.check_access(owner)?;
        let tile = u8::try_from(tile)
            .ok()
            .filter(|t| *t < self.total_tiles)
            .ok_or(EngineError::TileOutOfRange {
                tile,
                total_tiles: self.total_tiles,
            })?;
        if self.revealed_set.contains(tile) {
            return Err(EngineError::TileAlreadyRevealed { tile });
        }

        let mut next = self.clone();
        if next.hazards.contains(tile) {
            let settlement = next.finish(RoundState::Lost, Ratio::ZERO, Amount::ZERO);
            let outcome = RevealOutcome {
                round_id: next.id,
                kind: RevealKind::HazardHit,
                tile,
                revealed_tiles: next.revealed.clone(),
                current_multiplier: Ratio::ZERO,
                safe_tiles_remaining: next.safe_tiles_remaining(),
                disclosure: Some(next.disclosure()),
                settlement: Some(settlement),
            };
            return Ok((next, outcome));
        }

        next.revealed.push(tile);
        next.revealed_set.insert(tile);
        // One table entry per safe tile, and a hazard-free tile was just added.
        let multiplier = next.multiplier_table[next.revealed.len() - 1];

        let (kind, disclosure, settlement) = if next.safe_tiles_remaining() == 0 {
            let payout = next.wager.apply(multiplier)?;
            let settlement = next.finish(RoundState::Won, multiplier, payout);
            (
                RevealKind::BoardCleared,
                Some(next.disclosure()),
                Some(settlement),
            )
        } else {
            (RevealKind::Safe, None, None)
        };

        let outcome = RevealOutcome {
            round_id: next.id,
            kind,
            tile,
            revealed_tiles: next.revealed.clone(),
            current_multiplier: multiplier,
            safe_tiles_remaining: next.safe_tiles_remaining(),
            disclosure,
            settlement,
        };
        Ok((next, outcome))
    }

    pub fn cash_out(&self, owner: &OwnerId) -> EngineResult<(Round, CashOutOutcome)> {
        self.check_access(owner)?;
        let multiplier = self
            .current_multiplier()
            .ok_or(EngineError::NoRevealsYet { round_id: self.id })?;
        let payout = self.wager.apply(multiplier)?;

        let mut next = self.clone();
        let settlement = next.finish(RoundState::Won, multiplier, payout);
        let outcome = CashOutOutcome {
            round_id: next.id,
            payout,
            picks: next.revealed.clone(),
            current_multiplier: multiplier,
            disclosure: next.disclosure(),
            settlement,
        };
        Ok((next, outcome))
    }

    #[cfg(test)]
    pub(crate) fn hazards(&self) -> TileSet {
        self.hazards
    }
}
