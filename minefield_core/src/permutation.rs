//! Hazard placement.
//!
//! The board is shuffled with a Fisher–Yates pass driven by the round's
//! keystream, walking from the last index down to 1 and swapping each
//! position with a uniformly drawn index at or below it. The first
//! `hazard_count` entries of the shuffled board are the hazards.

use crate::board::TileSet;
use crate::rng::ProvablyFairRng;
use crate::seed::ServerSeed;

pub fn derive_permutation(
    server_seed: &ServerSeed,
    client_seed: &str,
    nonce: u64,
    total_tiles: u8,
) -> Vec<u8> {
    let mut tiles: Vec<u8> = (0..total_tiles).collect();
    let mut stream = ProvablyFairRng::new(server_seed, client_seed, nonce).keystream();
    for i in (1..tiles.len()).rev() {
        let j = stream.uniform(i as u32 + 1) as usize;
        tiles.swap(i, j);
    }
    tiles
}

pub fn derive_hazard_set(
    server_seed: &ServerSeed,
    client_seed: &str,
    nonce: u64,
    total_tiles: u8,
    hazard_count: u8,
) -> TileSet {
    derive_permutation(server_seed, client_seed, nonce, total_tiles)
        .into_iter()
        .take(hazard_count as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_tile_board() {
        let seed = ServerSeed::from_bytes([3u8; 32]);
        assert_eq!(derive_permutation(&seed, "c", 1, 1), vec![0]);
        assert!(derive_permutation(&seed, "c", 1, 0).is_empty());
    }

    #[test]
    fn test_reference_vectors() {
        // Independently computed with a separate HMAC-SHA256 implementation.
        let seed = ServerSeed::from_bytes([0x5a; 32]);
        assert_eq!(
            derive_permutation(&seed, "fixture", 1, 25),
            vec![
                17, 24, 23, 0, 12, 11, 10, 7, 19, 14, 22, 16, 4, 18, 1, 21, 3, 8, 13, 5, 6, 20, 2,
                9, 15
            ]
        );
        assert_eq!(
            derive_hazard_set(&seed, "fixture", 2, 25, 3).to_vec(),
            vec![7, 10, 21]
        );
        let zero = ServerSeed::from_bytes([0u8; 32]);
        assert_eq!(
            derive_permutation(&zero, "", 0, 10),
            vec![0, 4, 5, 1, 3, 6, 9, 7, 8, 2]
        );
    }

    #[test]
    fn test_hazard_set_is_prefix() {
        let seed = ServerSeed::from_bytes([3u8; 32]);
        let perm = derive_permutation(&seed, "client", 4, 25);
        let hazards = derive_hazard_set(&seed, "client", 4, 25, 5);
        assert_eq!(hazards.len(), 5);
        for tile in &perm[..5] {
            assert!(hazards.contains(*tile));
        }
        for tile in &perm[5..] {
            assert!(!hazards.contains(*tile));
        }
    }

    #[test]
    fn test_every_tile_can_be_a_hazard() {
        // Over many nonces each tile should lead the permutation at least once.
        let seed = ServerSeed::from_bytes([9u8; 32]);
        let mut seen = TileSet::empty();
        for nonce in 0..2_000u64 {
            seen.insert(derive_permutation(&seed, "spread", nonce, 25)[0]);
        }
        assert_eq!(seen.len(), 25);
    }

    proptest! {
        #[test]
        fn permutation_covers_board(
            bytes in prop::array::uniform32(any::<u8>()),
            client in "[a-z0-9]{0,24}",
            nonce in any::<u64>(),
            total in 1u8..=64,
        ) {
            let seed = ServerSeed::from_bytes(bytes);
            let perm = derive_permutation(&seed, &client, nonce, total);
            prop_assert_eq!(perm.len(), total as usize);
            let set: TileSet = perm.iter().copied().collect();
            prop_assert_eq!(set.len(), total as usize);
            prop_assert!(perm.iter().all(|t| *t < total));
        }

        #[test]
        fn hazard_set_is_deterministic(
            bytes in prop::array::uniform32(any::<u8>()),
            nonce in any::<u64>(),
            hazards in 1u8..25,
        ) {
            let seed = ServerSeed::from_bytes(bytes);
            let a = derive_hazard_set(&seed, "fixed", nonce, 25, hazards);
            let b = derive_hazard_set(&seed, "fixed", nonce, 25, hazards);
            prop_assert_eq!(a, b);
            prop_assert_eq!(a.len(), hazards as usize);
        }
    }
}
