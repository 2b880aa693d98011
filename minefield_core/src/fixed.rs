use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::payout::Ratio;

// Money is held in minor units with 2 decimal places (1.00 == 100).
pub const DECIMALS: u32 = 2;
pub const MINOR_PER_UNIT: u64 = 100;

/// Fixed-point currency amount.
///
/// Serialized as a decimal string (`"12.50"`) so that no consumer ever routes
/// it through binary floating point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u64);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    #[error("empty amount")]
    Empty,
    #[error("amount must be digits with at most 2 decimal places")]
    Malformed,
    #[error("amount too large")]
    Overflow,
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: u64) -> Self {
        Amount(minor)
    }

    /// Whole currency units, `None` on overflow.
    pub fn from_units(units: u64) -> Option<Self> {
        units.checked_mul(MINOR_PER_UNIT).map(Amount)
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Multiply by an exact multiplier, rounding half-down to the minor unit.
    ///
    /// This is the only place where payout math loses precision.
    pub fn apply(self, multiplier: Ratio) -> EngineResult<Amount> {
        let overflow = || EngineError::PayoutOverflow { wager: self };
        let product = (self.0 as u128)
            .checked_mul(multiplier.numer())
            .ok_or_else(overflow)?;
        let denom = multiplier.denom();
        let quotient = product / denom;
        let remainder = product % denom;
        // Exact halves stay down.
        let rounded = if remainder > denom - remainder {
            quotient + 1
        } else {
            quotient
        };
        u64::try_from(rounded).map(Amount).map_err(|_| overflow())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_PER_UNIT,
            self.0 % MINOR_PER_UNIT
        )
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty()
            || !digits(whole)
            || !digits(frac)
            || frac.len() > DECIMALS as usize
        {
            return Err(ParseAmountError::Malformed);
        }
        if s.contains('.') && frac.is_empty() {
            return Err(ParseAmountError::Malformed);
        }
        let units: u64 = whole.parse().map_err(|_| ParseAmountError::Overflow)?;
        let mut minor_frac: u64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| ParseAmountError::Malformed)?
        };
        if frac.len() == 1 {
            minor_frac *= 10;
        }
        units
            .checked_mul(MINOR_PER_UNIT)
            .and_then(|m| m.checked_add(minor_frac))
            .map(Amount)
            .ok_or(ParseAmountError::Overflow)
    }
}

impl TryFrom<String> for Amount {
    type Error = ParseAmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("10".parse::<Amount>().unwrap(), Amount::from_minor(1000));
        assert_eq!("10.5".parse::<Amount>().unwrap(), Amount::from_minor(1050));
        assert_eq!("0.07".parse::<Amount>().unwrap(), Amount::from_minor(7));
        assert_eq!(Amount::from_minor(1050).to_string(), "10.50");
        assert_eq!(Amount::from_minor(7).to_string(), "0.07");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!("".parse::<Amount>(), Err(ParseAmountError::Empty));
        assert_eq!("1.234".parse::<Amount>(), Err(ParseAmountError::Malformed));
        assert_eq!("-1".parse::<Amount>(), Err(ParseAmountError::Malformed));
        assert_eq!(".5".parse::<Amount>(), Err(ParseAmountError::Malformed));
        assert_eq!("5.".parse::<Amount>(), Err(ParseAmountError::Malformed));
        assert_eq!("1e3".parse::<Amount>(), Err(ParseAmountError::Malformed));
        assert_eq!(
            "184467440737095517".parse::<Amount>(),
            Err(ParseAmountError::Overflow)
        );
    }

    #[test]
    fn test_apply_rounds_half_down() {
        let wager = Amount::from_minor(1); // 0.01
        // 0.01 * 1.5 = 0.015 -> 0.01
        assert_eq!(wager.apply(Ratio::new(3, 2).unwrap()).unwrap(), Amount::from_minor(1));
        // 0.01 * 1.6 = 0.016 -> 0.02
        assert_eq!(wager.apply(Ratio::new(8, 5).unwrap()).unwrap(), Amount::from_minor(2));
        // 0.01 * 1.4 = 0.014 -> 0.01
        assert_eq!(wager.apply(Ratio::new(7, 5).unwrap()).unwrap(), Amount::from_minor(1));
    }

    #[test]
    fn test_apply_exact() {
        let wager = Amount::from_units(10).unwrap();
        assert_eq!(wager.apply(Ratio::new(33, 20).unwrap()).unwrap(), Amount::from_minor(1650));
        assert_eq!(wager.apply(Ratio::ZERO).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_apply_overflow() {
        let wager = Amount::from_minor(u64::MAX);
        assert!(matches!(
            wager.apply(Ratio::new(2, 1).unwrap()),
            Err(EngineError::PayoutOverflow { .. })
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let a = Amount::from_minor(1234);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"12.34\"");
        let back: Amount = serde_json::from_str("\"12.34\"").unwrap();
        assert_eq!(back, a);
    }
}
