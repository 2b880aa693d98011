use std::thread;

use minefield_core::{
    Amount, EngineError, EngineResult, OwnerId, RevealKind, RoundEngine, Settlement,
};
use tracing::debug;

/// Totals over a batch of simulated rounds. Money is in minor units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub rounds: u64,
    pub wins: u64,
    pub losses: u64,
    pub wagered: u128,
    pub paid: u128,
}

impl Tally {
    fn record(&mut self, settlement: &Settlement) {
        self.rounds += 1;
        self.wagered += u128::from(settlement.wager.minor());
        self.paid += u128::from(settlement.payout.minor());
        if settlement.payout.is_zero() {
            self.losses += 1;
        } else {
            self.wins += 1;
        }
    }

    fn merge(mut self, other: Tally) -> Tally {
        self.rounds += other.rounds;
        self.wins += other.wins;
        self.losses += other.losses;
        self.wagered += other.wagered;
        self.paid += other.paid;
        self
    }

    pub fn rtp(&self) -> f64 {
        if self.wagered == 0 {
            return 0.0;
        }
        self.paid as f64 / self.wagered as f64
    }
}

/// Play one round: reveal tiles `0..picks` in order, cash out if every pick
/// was safe and the board was not already cleared.
pub fn play_fixed_strategy(
    engine: &RoundEngine,
    owner: &OwnerId,
    wager: Amount,
    hazard_count: u8,
    picks: u8,
) -> EngineResult<Settlement> {
    let round = engine.start(owner, wager, hazard_count, None)?;
    for tile in 0..u32::from(picks) {
        let outcome = engine.reveal(round.round_id, owner, tile)?;
        if let Some(settlement) = outcome.settlement {
            return Ok(settlement);
        }
        debug_assert_eq!(outcome.kind, RevealKind::Safe);
    }
    Ok(engine.cash_out(round.round_id, owner)?.settlement)
}

/// Spread `rounds` across `workers` owners playing in parallel.
pub fn simulate(
    engine: &RoundEngine,
    rounds: u64,
    workers: u32,
    wager: Amount,
    hazard_count: u8,
    picks: u8,
) -> EngineResult<Tally> {
    let safe_tiles = engine.params().total_tiles - hazard_count.min(engine.params().total_tiles);
    if picks == 0 || picks > safe_tiles {
        return Err(EngineError::TooManyPicks { picks, safe_tiles });
    }
    let workers = u64::from(workers.max(1));
    thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let share = rounds / workers + u64::from(w < rounds % workers);
                s.spawn(move || -> EngineResult<Tally> {
                    let owner = OwnerId::new(format!("sim-{w}"));
                    let mut tally = Tally::default();
                    for _ in 0..share {
                        let settlement =
                            play_fixed_strategy(engine, &owner, wager, hazard_count, picks)?;
                        tally.record(&settlement);
                    }
                    debug!(owner = %owner, rounds = tally.rounds, "worker done");
                    Ok(tally)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .try_fold(Tally::default(), |acc, t| -> EngineResult<Tally> {
                Ok(acc.merge(t?))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use minefield_core::{EngineParams, RoundStore};

    fn engine() -> RoundEngine {
        RoundEngine::new(EngineParams::default()).unwrap()
    }

    #[test]
    fn test_tally_counts_every_round() {
        let engine = engine();
        let wager = Amount::from_units(1).unwrap();
        let tally = simulate(&engine, 203, 4, wager, 5, 2).unwrap();
        assert_eq!(tally.rounds, 203);
        assert_eq!(tally.wins + tally.losses, 203);
        assert_eq!(tally.wagered, 203 * 100);
        assert_eq!(engine.store().active_count(), 0);
    }

    #[test]
    fn test_rtp_near_retained_share() {
        // One pick against one hazard: win 24/25 of the time at 25/24 * 0.99.
        let engine = engine();
        let wager = Amount::from_units(100).unwrap();
        let tally = simulate(&engine, 20_000, 4, wager, 1, 1).unwrap();
        let rtp = tally.rtp();
        assert!((rtp - 0.99).abs() < 0.02, "rtp {rtp}");
    }

    #[test]
    fn test_clearing_board_needs_no_cash_out() {
        let engine = engine();
        let wager = Amount::from_units(1).unwrap();
        // 24 hazards leave one safe tile; every round settles on the first reveal.
        let tally = simulate(&engine, 50, 2, wager, 24, 1).unwrap();
        assert_eq!(tally.rounds, 50);
    }

    #[test]
    fn test_pick_count_is_checked() {
        let engine = engine();
        let wager = Amount::from_units(1).unwrap();
        assert_eq!(
            simulate(&engine, 10, 1, wager, 24, 2).unwrap_err(),
            EngineError::TooManyPicks {
                picks: 2,
                safe_tiles: 1
            }
        );
        assert!(simulate(&engine, 10, 1, wager, 3, 0).is_err());
        assert_eq!(engine.store().active_count(), 0);
    }
}
