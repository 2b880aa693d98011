//! Server seed commitments.
//!
//! A round's server seed is 32 bytes from the operating system CSPRNG. Its
//! SHA-256 digest is published when the round starts; the seed itself is only
//! disclosed once the round is over, so the owner can check that the hazard
//! layout was fixed before their first pick.

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, EngineResult};

pub const SEED_LEN: usize = 32;
const CLIENT_SEED_BYTES: usize = 16;

pub fn sha256(input: &[u8]) -> [u8; SEED_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

pub fn derive_hash_hex(input: &[u8]) -> String {
    hex::encode(sha256(input))
}

fn decode_hex32(s: &str, field: &'static str) -> EngineResult<[u8; SEED_LEN]> {
    let mut out = [0u8; SEED_LEN];
    hex::decode_to_slice(s.trim(), &mut out).map_err(|_| EngineError::MalformedHex { field })?;
    Ok(out)
}

fn fill_secure(buf: &mut [u8]) -> EngineResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| EngineError::EntropyUnavailable(e.to_string()))
}

/// Secret server seed. Deliberately not `Serialize`, and `Debug` is redacted:
/// the only way out is [`ServerSeed::to_hex`], called when a round ends.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerSeed([u8; SEED_LEN]);

impl ServerSeed {
    pub fn generate() -> EngineResult<Self> {
        let mut bytes = [0u8; SEED_LEN];
        fill_secure(&mut bytes)?;
        Ok(ServerSeed(bytes))
    }

    pub const fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        ServerSeed(bytes)
    }

    pub fn from_hex(s: &str) -> EngineResult<Self> {
        decode_hex32(s, "server seed").map(ServerSeed)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn hash(&self) -> SeedHash {
        SeedHash(sha256(&self.0))
    }
}

impl fmt::Debug for ServerSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerSeed(<redacted>)")
    }
}

/// SHA-256 commitment to a [`ServerSeed`], rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeedHash([u8; SEED_LEN]);

impl SeedHash {
    pub const fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        SeedHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl fmt::Display for SeedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SeedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedHash({self})")
    }
}

impl FromStr for SeedHash {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex32(s, "server seed hash").map(SeedHash)
    }
}

impl TryFrom<String> for SeedHash {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeedHash> for String {
    fn from(value: SeedHash) -> Self {
        value.to_string()
    }
}

/// A server seed together with its published hash.
#[derive(Debug, Clone)]
pub struct SeedCommitment {
    server_seed: ServerSeed,
    server_seed_hash: SeedHash,
}

impl SeedCommitment {
    pub fn from_seed(server_seed: ServerSeed) -> Self {
        let server_seed_hash = server_seed.hash();
        Self {
            server_seed,
            server_seed_hash,
        }
    }

    pub fn server_seed(&self) -> &ServerSeed {
        &self.server_seed
    }

    pub fn server_seed_hash(&self) -> SeedHash {
        self.server_seed_hash
    }
}

/// Fresh seed and hash. Fails only when the OS CSPRNG does; callers must not
/// fall back to weaker randomness.
pub fn create_seed() -> EngineResult<SeedCommitment> {
    ServerSeed::generate().map(SeedCommitment::from_seed)
}

/// Recompute the hash of `server_seed` and compare. A mismatch is an expected
/// answer when auditing a tampered disclosure, so it is not an error.
pub fn verify_commitment(server_seed: &ServerSeed, server_seed_hash: &SeedHash) -> bool {
    server_seed.hash() == *server_seed_hash
}

/// Where the engine gets server seeds from.
pub trait SeedSource: Send + Sync {
    fn server_seed(&self) -> EngineResult<ServerSeed>;
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSeedSource;

impl SeedSource for OsSeedSource {
    fn server_seed(&self) -> EngineResult<ServerSeed> {
        ServerSeed::generate()
    }
}

/// Client seed used when the owner does not supply one.
pub fn generate_client_seed() -> EngineResult<String> {
    let mut bytes = [0u8; CLIENT_SEED_BYTES];
    fill_secure(&mut bytes)?;
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_matches() {
        let c = create_seed().unwrap();
        assert!(verify_commitment(c.server_seed(), &c.server_seed_hash()));
        assert_eq!(
            c.server_seed_hash().to_string(),
            derive_hash_hex(c.server_seed().as_bytes())
        );
    }

    #[test]
    fn test_seeds_differ() {
        let a = create_seed().unwrap();
        let b = create_seed().unwrap();
        assert_ne!(a.server_seed(), b.server_seed());
    }

    #[test]
    fn test_known_vector() {
        // sha256 of 32 zero bytes
        let seed = ServerSeed::from_bytes([0u8; SEED_LEN]);
        assert_eq!(
            seed.hash().to_string(),
            "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
    }

    #[test]
    fn test_hex_round_trip_and_errors() {
        let seed = ServerSeed::from_bytes([7u8; SEED_LEN]);
        assert_eq!(ServerSeed::from_hex(&seed.to_hex()).unwrap(), seed);
        assert!(matches!(
            ServerSeed::from_hex("abcd"),
            Err(EngineError::MalformedHex { .. })
        ));
        assert!("zz".repeat(32).parse::<SeedHash>().is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let seed = ServerSeed::from_bytes([0xab; SEED_LEN]);
        assert!(!format!("{seed:?}").contains("abab"));
    }

    #[test]
    fn test_client_seed_shape() {
        let s = generate_client_seed().unwrap();
        assert_eq!(s.len(), CLIENT_SEED_BYTES * 2);
    }
}
