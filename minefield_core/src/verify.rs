use serde::{Deserialize, Serialize};

use crate::board::check_board;
use crate::error::EngineResult;
use crate::permutation::derive_hazard_set;
use crate::round::SeedDisclosure;
use crate::seed::{verify_commitment, SeedHash, ServerSeed};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_positions: Option<Vec<u8>>,
}

/// Recompute a finished round from its published values.
///
/// The board shape is checked first, then the commitment. If the disclosed
/// seed does not match its hash, nothing else is derived from it.
pub fn verify(
    server_seed_hash: &SeedHash,
    server_seed: &ServerSeed,
    client_seed: &str,
    nonce: u64,
    total_tiles: u8,
    hazard_count: u8,
) -> EngineResult<Verification> {
    check_board(total_tiles, hazard_count)?;
    if !verify_commitment(server_seed, server_seed_hash) {
        return Ok(Verification {
            valid: false,
            hazard_positions: None,
        });
    }
    let hazards = derive_hazard_set(server_seed, client_seed, nonce, total_tiles, hazard_count);
    Ok(Verification {
        valid: true,
        hazard_positions: Some(hazards.to_vec()),
    })
}

/// Check a disclosure bundle end to end, including the hazard layout the
/// house claims it used.
pub fn verify_disclosure(disclosure: &SeedDisclosure) -> EngineResult<bool> {
    let server_seed = ServerSeed::from_hex(&disclosure.server_seed)?;
    let verification = verify(
        &disclosure.server_seed_hash,
        &server_seed,
        &disclosure.client_seed,
        disclosure.nonce,
        disclosure.total_tiles,
        disclosure.hazard_count,
    )?;
    let mut claimed = disclosure.hazard_positions.clone();
    claimed.sort_unstable();
    Ok(verification.valid && verification.hazard_positions.as_deref() == Some(&claimed[..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_valid_seed() {
        let seed = ServerSeed::from_bytes([5u8; 32]);
        let v = verify(&seed.hash(), &seed, "client", 3, 25, 3).unwrap();
        assert!(v.valid);
        assert_eq!(
            v.hazard_positions.unwrap(),
            derive_hazard_set(&seed, "client", 3, 25, 3).to_vec()
        );
    }

    #[test]
    fn test_every_bit_flip_detected() {
        let bytes = [5u8; 32];
        let hash = ServerSeed::from_bytes(bytes).hash();
        for byte in 0..32 {
            for bit in 0..8 {
                let mut tampered = bytes;
                tampered[byte] ^= 1 << bit;
                let v = verify(&hash, &ServerSeed::from_bytes(tampered), "c", 1, 25, 3).unwrap();
                assert!(!v.valid);
                assert!(v.hazard_positions.is_none());
            }
        }
    }

    #[test]
    fn test_bad_shape() {
        let seed = ServerSeed::from_bytes([5u8; 32]);
        assert!(matches!(
            verify(&seed.hash(), &seed, "c", 1, 25, 25),
            Err(EngineError::InvalidBoard { .. })
        ));
    }

    #[test]
    fn test_disclosure_with_wrong_layout() {
        let seed = ServerSeed::from_bytes([5u8; 32]);
        let hazards = derive_hazard_set(&seed, "c", 1, 25, 3).to_vec();
        let mut disclosure = SeedDisclosure {
            server_seed: seed.to_hex(),
            server_seed_hash: seed.hash(),
            client_seed: "c".into(),
            nonce: 1,
            total_tiles: 25,
            hazard_count: 3,
            hazard_positions: hazards.clone(),
        };
        assert!(verify_disclosure(&disclosure).unwrap());
        let moved = (0..25u8).find(|t| !hazards.contains(t)).unwrap();
        disclosure.hazard_positions[0] = moved;
        assert!(!verify_disclosure(&disclosure).unwrap());
    }
}
