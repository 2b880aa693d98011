use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::{check_client_seed, EngineParams},
    error::{EngineError, EngineResult},
    fixed::Amount,
    payout::{multiplier_table, HouseEdge, Ratio},
    round::{CashOutOutcome, OwnerId, RevealKind, RevealOutcome, Round, RoundId, RoundSummary},
    seed::{generate_client_seed, OsSeedSource, SeedCommitment, SeedSource},
    store::{MemoryRoundStore, RoundStore},
};

/// Round lifecycle driver. Safe to share across request threads.
pub struct RoundEngine<S = MemoryRoundStore> {
    params: EngineParams,
    edge: HouseEdge,
    store: S,
    seeds: Arc<dyn SeedSource>,
}

impl RoundEngine<MemoryRoundStore> {
    pub fn new(params: EngineParams) -> EngineResult<Self> {
        Self::with_store(params, MemoryRoundStore::new())
    }
}

impl<S: RoundStore> RoundEngine<S> {
    pub fn with_store(params: EngineParams, store: S) -> EngineResult<Self> {
        let edge = params.validate()?;
        Ok(Self {
            params,
            edge,
            store,
            seeds: Arc::new(OsSeedSource),
        })
    }

    /// Replace the OS CSPRNG as the source of server seeds.
    pub fn with_seed_source(mut self, seeds: impl SeedSource + 'static) -> Self {
        self.seeds = Arc::new(seeds);
        self
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn house_edge(&self) -> HouseEdge {
        self.edge
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Payout curve for `hazard_count` on this engine's board.
    pub fn multiplier_table(&self, hazard_count: u8) -> EngineResult<Vec<Ratio>> {
        self.params.check_hazards(hazard_count)?;
        multiplier_table(hazard_count, self.params.total_tiles, self.edge)
    }

    pub fn start(
        &self,
        owner: &OwnerId,
        wager: Amount,
        hazard_count: u8,
        client_seed: Option<String>,
    ) -> EngineResult<RoundSummary> {
        self.params.check_hazards(hazard_count)?;
        self.params.check_wager(wager)?;
        let client_seed = match client_seed {
            Some(seed) => {
                check_client_seed(&seed)?;
                seed
            }
            None => generate_client_seed()?,
        };
        // Entropy failures abort here, before any nonce is consumed.
        let commitment = SeedCommitment::from_seed(self.seeds.server_seed()?);
        let total_tiles = self.params.total_tiles;
        let edge = self.edge;

        let summary = self.store.with_owner(owner, |slot| {
            if let Some(round_id) = slot.active_round() {
                return Err(EngineError::RoundAlreadyActive { round_id });
            }
            // Nothing below fails once we know the shape is valid, so the nonce
            // is only consumed by a round that actually starts.
            let nonce = slot.last_nonce() + 1;
            let round = Round::new(
                owner.clone(),
                commitment,
                client_seed,
                nonce,
                wager,
                hazard_count,
                total_tiles,
                edge,
            )?;
            slot.next_nonce();
            slot.set_active(round.id());
            let summary = round.summary();
            self.store.insert(round);
            Ok(summary)
        });

        match &summary {
            Ok(s) => info!(
                round_id = %s.round_id,
                owner = %owner,
                nonce = s.nonce,
                hazards = hazard_count,
                wager = %wager,
                seed_hash = %s.server_seed_hash,
                "round started"
            ),
            Err(e) => warn!(owner = %owner, error = %e, "round start rejected"),
        }
        summary
    }

    pub fn reveal(
        &self,
        round_id: RoundId,
        owner: &OwnerId,
        tile: u32,
    ) -> EngineResult<RevealOutcome> {
        let result = self
            .store
            .with_round(&round_id, |round| {
                let (next, outcome) = round.reveal(owner, tile)?;
                *round = next;
                if round.state().is_terminal() {
                    self.store.retire(round);
                }
                Ok(outcome)
            })
            .unwrap_or_else(|| Err(self.missing_round(round_id, owner)));

        match &result {
            Ok(outcome) => match outcome.kind {
                RevealKind::Safe => debug!(
                    round_id = %round_id,
                    tile = outcome.tile,
                    picks = outcome.revealed_tiles.len(),
                    multiplier = %outcome.current_multiplier.to_decimal_string(4),
                    "safe reveal"
                ),
                RevealKind::HazardHit => info!(
                    round_id = %round_id,
                    owner = %owner,
                    tile = outcome.tile,
                    picks = outcome.revealed_tiles.len(),
                    "round lost"
                ),
                RevealKind::BoardCleared => info!(
                    round_id = %round_id,
                    owner = %owner,
                    multiplier = %outcome.current_multiplier.to_decimal_string(4),
                    "board cleared"
                ),
            },
            Err(e) => warn!(round_id = %round_id, owner = %owner, error = %e, "reveal rejected"),
        }
        result
    }

    pub fn cash_out(&self, round_id: RoundId, owner: &OwnerId) -> EngineResult<CashOutOutcome> {
        let result = self
            .store
            .with_round(&round_id, |round| {
                let (next, outcome) = round.cash_out(owner)?;
                *round = next;
                self.store.retire(round);
                Ok(outcome)
            })
            .unwrap_or_else(|| Err(self.missing_round(round_id, owner)));

        match &result {
            Ok(outcome) => info!(
                round_id = %round_id,
                owner = %owner,
                picks = outcome.picks.len(),
                payout = %outcome.payout,
                "round cashed out"
            ),
            Err(e) => warn!(round_id = %round_id, owner = %owner, error = %e, "cash out rejected"),
        }
        result
    }

    /// Error for a round id with no live round behind it.
    fn missing_round(&self, round_id: RoundId, owner: &OwnerId) -> EngineError {
        match self.store.finished(&round_id) {
            Some(f) if &f.owner != owner => EngineError::Unauthorized { round_id },
            Some(f) => EngineError::RoundNotActive {
                round_id,
                state: f.state,
            },
            None => EngineError::RoundNotFound { round_id },
        }
    }

    /// The owner's in-progress round, if any.
    pub fn active_round(&self, owner: &OwnerId) -> Option<RoundSummary> {
        // Owner scope is released before the round scope is entered.
        let round_id = self.store.with_owner(owner, |slot| slot.active_round())?;
        self.store.with_round(&round_id, |round| round.summary())
    }
}
