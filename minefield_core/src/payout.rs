use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::check_board;
use crate::error::{EngineError, EngineResult};

pub const BPS_SCALE: u16 = 10_000;

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Exact non-negative rational, always stored in lowest terms.
///
/// Serialized as `"numer/denom"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ratio {
    numer: u128,
    denom: u128,
}

impl Ratio {
    pub const ZERO: Ratio = Ratio { numer: 0, denom: 1 };
    pub const ONE: Ratio = Ratio { numer: 1, denom: 1 };

    pub fn new(numer: u128, denom: u128) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let g = gcd(numer, denom);
        Some(Ratio {
            numer: numer / g,
            denom: denom / g,
        })
    }

    pub const fn numer(self) -> u128 {
        self.numer
    }

    pub const fn denom(self) -> u128 {
        self.denom
    }

    pub fn checked_mul(self, other: Ratio) -> Option<Ratio> {
        // Cross-reduce first so intermediates never exceed the reduced result.
        let g1 = gcd(self.numer, other.denom);
        let g2 = gcd(other.numer, self.denom);
        let numer = (self.numer / g1).checked_mul(other.numer / g2)?;
        let denom = (self.denom / g2).checked_mul(other.denom / g1)?;
        Some(Ratio { numer, denom })
    }

    /// Decimal rendering truncated to `places` digits.
    pub fn to_decimal_string(self, places: u32) -> String {
        let mut out = (self.numer / self.denom).to_string();
        if places > 0 {
            out.push('.');
            let mut rem = self.numer % self.denom;
            for _ in 0..places {
                // rem * 10 / denom by repeated addition mod denom, so a
                // denominator near u128::MAX cannot overflow.
                let mut digit = 0u8;
                let mut acc = 0u128;
                for _ in 0..10 {
                    let room = self.denom - acc;
                    if rem >= room {
                        acc = rem - room;
                        digit += 1;
                    } else {
                        acc += rem;
                    }
                }
                out.push(char::from(b'0' + digit));
                rem = acc;
            }
        }
        out
    }

    /// Lossy, for display and statistics only.
    pub fn to_f64(self) -> f64 {
        self.numer as f64 / self.denom as f64
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        // Continued-fraction comparison; never multiplies, so never overflows.
        let (mut a, mut b, mut c, mut d) = (self.numer, self.denom, other.numer, other.denom);
        loop {
            let (q1, q2) = (a / b, c / d);
            if q1 != q2 {
                return q1.cmp(&q2);
            }
            let (r1, r2) = (a % b, c % d);
            match (r1 == 0, r2 == 0) {
                (true, true) => return Ordering::Equal,
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                // r1/b vs r2/d has the same order as d/r2 vs b/r1
                (false, false) => {
                    (a, b, c, d) = (d, r2, b, r1);
                }
            }
        }
    }
}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("expected a ratio of the form numer/denom with non-zero denom")]
pub struct ParseRatioError;

impl FromStr for Ratio {
    type Err = ParseRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (n, d) = s.split_once('/').ok_or(ParseRatioError)?;
        let n = n.trim().parse().map_err(|_| ParseRatioError)?;
        let d = d.trim().parse().map_err(|_| ParseRatioError)?;
        Ratio::new(n, d).ok_or(ParseRatioError)
    }
}

impl TryFrom<String> for Ratio {
    type Error = ParseRatioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ratio> for String {
    fn from(value: Ratio) -> Self {
        value.to_string()
    }
}

/// House edge in basis points, strictly below 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct HouseEdge(u16);

impl HouseEdge {
    pub const ZERO: HouseEdge = HouseEdge(0);

    pub fn from_bps(bps: u16) -> EngineResult<Self> {
        if bps >= BPS_SCALE {
            return Err(EngineError::HouseEdgeTooHigh { bps });
        }
        Ok(HouseEdge(bps))
    }

    pub const fn bps(self) -> u16 {
        self.0
    }

    /// `1 - edge`, the share of the fair multiplier paid out.
    pub fn retained(self) -> Ratio {
        Ratio::new((BPS_SCALE - self.0) as u128, BPS_SCALE as u128).unwrap_or(Ratio::ONE)
    }
}

impl TryFrom<u16> for HouseEdge {
    type Error = EngineError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        HouseEdge::from_bps(value)
    }
}

impl From<HouseEdge> for u16 {
    fn from(value: HouseEdge) -> Self {
        value.0
    }
}

impl fmt::Display for HouseEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

fn board_err(total_tiles: u8, hazard_count: u8) -> EngineError {
    EngineError::InvalidBoard {
        total_tiles,
        hazard_count,
    }
}

/// Fair multiplier for `picks` safe reveals: `C(T, k) / C(T - N, k)`, built
/// as the running product of `(T - i) / (T - N - i)`.
pub fn fair_multiplier(picks: u8, hazards: u8, tiles: u8) -> EngineResult<Ratio> {
    check_board(tiles, hazards)?;
    let safe_tiles = tiles - hazards;
    if picks > safe_tiles {
        return Err(EngineError::TooManyPicks { picks, safe_tiles });
    }
    let mut m = Ratio::ONE;
    for i in 0..picks {
        let step = Ratio::new((tiles - i) as u128, (safe_tiles - i) as u128)
            .ok_or_else(|| board_err(tiles, hazards))?;
        m = m.checked_mul(step).ok_or_else(|| board_err(tiles, hazards))?;
    }
    Ok(m)
}

pub fn applied_multiplier(
    picks: u8,
    hazards: u8,
    tiles: u8,
    edge: HouseEdge,
) -> EngineResult<Ratio> {
    fair_multiplier(picks, hazards, tiles)?
        .checked_mul(edge.retained())
        .ok_or_else(|| board_err(tiles, hazards))
}

/// Applied multipliers for 1..=T-N picks; entry `k - 1` is the multiplier
/// after `k` safe reveals.
pub fn multiplier_table(hazards: u8, tiles: u8, edge: HouseEdge) -> EngineResult<Vec<Ratio>> {
    check_board(tiles, hazards)?;
    let safe_tiles = tiles - hazards;
    let retained = edge.retained();
    let mut table = Vec::with_capacity(safe_tiles as usize);
    let mut fair = Ratio::ONE;
    for i in 0..safe_tiles {
        let step = Ratio::new((tiles - i) as u128, (safe_tiles - i) as u128)
            .ok_or_else(|| board_err(tiles, hazards))?;
        fair = fair.checked_mul(step).ok_or_else(|| board_err(tiles, hazards))?;
        table.push(
            fair.checked_mul(retained)
                .ok_or_else(|| board_err(tiles, hazards))?,
        );
    }
    Ok(table)
}
