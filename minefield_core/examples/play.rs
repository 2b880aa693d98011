use minefield_core::{verify_disclosure, Amount, EngineParams, OwnerId, RevealKind, RoundEngine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example round: pick tiles left to right, cash out after three safe picks.
    let engine = RoundEngine::new(EngineParams::default())?;
    let owner = OwnerId::from("example-owner");
    let wager: Amount = "5.00".parse()?;
    let round = engine.start(&owner, wager, 3, Some("example-client-seed".into()))?;
    println!(
        "round={} nonce={} server_seed_hash={}",
        round.round_id, round.nonce, round.server_seed_hash
    );

    for tile in 0..u32::from(round.total_tiles) {
        let outcome = engine.reveal(round.round_id, &owner, tile)?;
        println!(
            "tile={} kind={:?} multiplier={}",
            tile,
            outcome.kind,
            outcome.current_multiplier.to_decimal_string(4)
        );
        if let Some(disclosure) = outcome.disclosure {
            println!("verified={}", verify_disclosure(&disclosure)?);
            return Ok(());
        }
        if outcome.kind == RevealKind::Safe && outcome.revealed_tiles.len() == 3 {
            break;
        }
    }

    let cash = engine.cash_out(round.round_id, &owner)?;
    println!(
        "payout={} hazards={:?} verified={}",
        cash.payout,
        cash.disclosure.hazard_positions,
        verify_disclosure(&cash.disclosure)?
    );
    Ok(())
}
