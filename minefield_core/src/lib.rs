pub mod board;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod payout;
pub mod permutation;
pub mod rng;
pub mod round;
pub mod seed;
pub mod store;
pub mod verify;

pub use crate::board::{check_board, TileSet, DEFAULT_TILES, MAX_TILES};
pub use crate::config::EngineParams;
pub use crate::engine::RoundEngine;
pub use crate::error::{EngineError, EngineResult, ErrorKind};
pub use crate::fixed::{Amount, ParseAmountError};
pub use crate::payout::{applied_multiplier, fair_multiplier, multiplier_table, HouseEdge, Ratio};
pub use crate::permutation::{derive_hazard_set, derive_permutation};
pub use crate::rng::{Keystream, ProvablyFairRng};
pub use crate::round::{
    CashOutOutcome, OwnerId, RevealKind, RevealOutcome, Round, RoundId, RoundState, RoundSummary,
    SeedDisclosure, Settlement,
};
pub use crate::seed::{
    create_seed, derive_hash_hex, verify_commitment, OsSeedSource, SeedCommitment, SeedHash,
    SeedSource, ServerSeed,
};
pub use crate::store::{
    FinishedRound, MemoryRoundStore, OwnerSlot, RoundStore, DEFAULT_FINISHED_CAPACITY,
};
pub use crate::verify::{verify, verify_disclosure, Verification};
