use std::fmt;

use chrono::{DateTime, Utc};
use minefield_core::{
    verify, Amount, EngineError, ErrorKind as EngineErrorKind, OwnerId, Ratio, RoundId,
    RoundState, SeedDisclosure, SeedHash, ServerSeed, Settlement, Verification,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub owner_id: OwnerId,
    pub wager: Amount,
    pub hazard_count: u8,
    #[serde(default)]
    pub client_seed: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RevealRequest {
    pub round_id: RoundId,
    pub owner_id: OwnerId,
    pub tile: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CashOutRequest {
    pub round_id: RoundId,
    pub owner_id: OwnerId,
}

/// Published values of a finished round, as an auditor would paste them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    pub server_seed_hash: String,
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
    pub total_tiles: u8,
    pub hazard_count: u8,
}

/// A [`VerifyRequest`] with its hex fields decoded.
#[derive(Debug, Clone)]
pub struct VerifyInput {
    pub server_seed_hash: SeedHash,
    pub server_seed: ServerSeed,
    pub client_seed: String,
    pub nonce: u64,
    pub total_tiles: u8,
    pub hazard_count: u8,
}

impl TryFrom<&VerifyRequest> for VerifyInput {
    type Error = ApiError;

    fn try_from(req: &VerifyRequest) -> Result<Self, Self::Error> {
        Ok(VerifyInput {
            server_seed_hash: req.server_seed_hash.parse()?,
            server_seed: ServerSeed::from_hex(&req.server_seed)?,
            client_seed: req.client_seed.clone(),
            nonce: req.nonce,
            total_tiles: req.total_tiles,
            hazard_count: req.hazard_count,
        })
    }
}

impl From<&SeedDisclosure> for VerifyRequest {
    fn from(d: &SeedDisclosure) -> Self {
        VerifyRequest {
            server_seed_hash: d.server_seed_hash.to_string(),
            server_seed: d.server_seed.clone(),
            client_seed: d.client_seed.clone(),
            nonce: d.nonce,
            total_tiles: d.total_tiles,
            hazard_count: d.hazard_count,
        }
    }
}

impl VerifyRequest {
    pub fn run(&self) -> ApiResult<VerifyResponse> {
        let input = VerifyInput::try_from(self)?;
        let verification = verify(
            &input.server_seed_hash,
            &input.server_seed,
            &input.client_seed,
            input.nonce,
            input.total_tiles,
            input.hazard_count,
        )?;
        Ok(verification.into())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazard_positions: Option<Vec<u8>>,
}

impl From<Verification> for VerifyResponse {
    fn from(v: Verification) -> Self {
        VerifyResponse {
            valid: v.valid,
            hazard_positions: v.hazard_positions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidParameter,
    NotFound,
    Unauthorized,
    InvalidState,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::NotFound => "not found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
        }
    }
}

impl From<&EngineError> for ApiError {
    fn from(e: &EngineError) -> Self {
        let kind = match e.kind() {
            EngineErrorKind::InvalidParameter => ErrorKind::InvalidParameter,
            EngineErrorKind::NotFound => ErrorKind::NotFound,
            EngineErrorKind::Unauthorized => ErrorKind::Unauthorized,
            EngineErrorKind::InvalidState => ErrorKind::InvalidState,
            // Details stay in the server log.
            EngineErrorKind::Fatal => return Self::new(ErrorKind::Internal, "internal error"),
        };
        Self::new(kind, e.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::from(&e)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// One settled round in the audit log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoundLogEntry {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub round_id: RoundId,
    pub owner_id: OwnerId,
    pub state: RoundState,
    pub nonce: u64,
    pub client_seed: String,
    pub server_seed_hash: SeedHash,
    pub server_seed: String,
    pub total_tiles: u8,
    pub hazard_count: u8,
    pub hazard_positions: Vec<u8>,
    pub picks: Vec<u8>,
    pub wager: Amount,
    pub multiplier: Ratio,
    pub payout: Amount,
}

impl RoundLogEntry {
    /// Entry for a terminal round. `id` is assigned by the log on insert.
    pub fn settled(settlement: &Settlement, disclosure: &SeedDisclosure) -> Self {
        RoundLogEntry {
            id: 0,
            ts: settlement.ended_at,
            round_id: settlement.round_id,
            owner_id: settlement.owner_id.clone(),
            state: settlement.state,
            nonce: disclosure.nonce,
            client_seed: disclosure.client_seed.clone(),
            server_seed_hash: disclosure.server_seed_hash,
            server_seed: disclosure.server_seed.clone(),
            total_tiles: disclosure.total_tiles,
            hazard_count: disclosure.hazard_count,
            hazard_positions: disclosure.hazard_positions.clone(),
            picks: settlement.picks.clone(),
            wager: settlement.wager,
            multiplier: settlement.multiplier,
            payout: settlement.payout,
        }
    }

    pub fn disclosure(&self) -> SeedDisclosure {
        SeedDisclosure {
            server_seed: self.server_seed.clone(),
            server_seed_hash: self.server_seed_hash,
            client_seed: self.client_seed.clone(),
            nonce: self.nonce,
            total_tiles: self.total_tiles,
            hazard_count: self.hazard_count,
            hazard_positions: self.hazard_positions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seed: &ServerSeed) -> VerifyRequest {
        VerifyRequest {
            server_seed_hash: seed.hash().to_string(),
            server_seed: seed.to_hex(),
            client_seed: "fixture".into(),
            nonce: 1,
            total_tiles: 25,
            hazard_count: 3,
        }
    }

    #[test]
    fn test_verify_request_runs() {
        let seed = ServerSeed::from_bytes([0x5a; 32]);
        let resp = request(&seed).run().unwrap();
        assert!(resp.valid);
        assert_eq!(resp.hazard_positions, Some(vec![17, 23, 24]));
    }

    #[test]
    fn test_verify_request_mismatch() {
        let seed = ServerSeed::from_bytes([0x5a; 32]);
        let mut req = request(&seed);
        req.server_seed = ServerSeed::from_bytes([0x5b; 32]).to_hex();
        let resp = req.run().unwrap();
        assert!(!resp.valid);
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"valid":false}"#);
    }

    #[test]
    fn test_verify_request_bad_hex() {
        let seed = ServerSeed::from_bytes([1; 32]);
        let mut req = request(&seed);
        req.server_seed_hash = "not hex".into();
        let err = req.run().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_error_mapping() {
        let round_id = RoundId::new();
        let cases = [
            (EngineError::RoundNotFound { round_id }, ErrorKind::NotFound),
            (EngineError::Unauthorized { round_id }, ErrorKind::Unauthorized),
            (EngineError::NoRevealsYet { round_id }, ErrorKind::InvalidState),
            (
                EngineError::TileAlreadyRevealed { tile: 3 },
                ErrorKind::InvalidState,
            ),
            (
                EngineError::TileOutOfRange {
                    tile: 99,
                    total_tiles: 25,
                },
                ErrorKind::InvalidParameter,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(ApiError::from(&err).kind, kind, "{err}");
        }
    }

    #[test]
    fn test_fatal_detail_not_exposed() {
        let err = ApiError::from(EngineError::EntropyUnavailable("getrandom: EIO".into()));
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(!err.message.contains("getrandom"));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "INTERNAL");
    }

    #[test]
    fn test_start_request_defaults_client_seed() {
        let req: StartRequest =
            serde_json::from_str(r#"{"owner_id":"alice","wager":"2.50","hazard_count":5}"#)
                .unwrap();
        assert_eq!(req.owner_id, OwnerId::from("alice"));
        assert_eq!(req.wager.minor(), 250);
        assert!(req.client_seed.is_none());
    }
}
