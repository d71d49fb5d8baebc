use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Number of fractional digits carried by [`Amount`].
const DECIMALS: u32 = 6;

const SCALE: i64 = 10_i64.pow(DECIMALS);

/// Amount of pooled value represented as **integer micro-units**
/// (`1 unit == 1_000_000` micro-units).
///
/// Use this type for **all** values in the ledger (balances, limits,
/// donations, withdrawals) to avoid floating-point drift. Counters only grow
/// through [`Amount::checked_add`], so an overflow is reported instead of
/// wrapping.
///
/// # Examples
///
/// ```rust
/// use engine::Amount;
///
/// let ceiling = Amount::new(29_000);
/// assert_eq!(ceiling.micros(), 29_000);
/// assert_eq!(ceiling.to_string(), "0.029");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects
/// more than 6 decimals):
///
/// ```rust
/// use engine::Amount;
///
/// assert_eq!("10".parse::<Amount>().unwrap().micros(), 10_000_000);
/// assert_eq!("0,5".parse::<Amount>().unwrap().micros(), 500_000);
/// assert!("0.0000001".parse::<Amount>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates a new amount from integer micro-units.
    #[must_use]
    pub const fn new(micros: i64) -> Self {
        Self(micros)
    }

    /// Returns the raw value in micro-units.
    #[must_use]
    pub const fn micros(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Subtraction clamped at zero, used for derived "remaining" values.
    #[must_use]
    pub fn saturating_remaining(self, spent: Amount) -> Amount {
        Amount(self.0.saturating_sub(spent.0).max(0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE.unsigned_abs();
        let units = abs / scale;
        let frac = abs % scale;
        if frac == 0 {
            return write!(f, "{sign}{units}");
        }
        let digits = format!("{frac:06}");
        write!(f, "{sign}{units}.{}", digits.trim_end_matches('0'))
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    /// Parses a decimal string into micro-units.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 6 fractional digits (rejects `0.0000001`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount("invalid amount".to_string());
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let units_str = parts.next().ok_or_else(invalid)?;
        let frac_str = parts.next();

        if parts.next().is_some() {
            return Err(invalid());
        }

        if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units_str.parse().map_err(|_| overflow())?;

        let frac: i64 = match frac_str {
            None | Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                if frac.len() > DECIMALS as usize {
                    return Err(EngineError::InvalidAmount("too many decimals".to_string()));
                }
                let padded = format!("{frac:0<width$}", width = DECIMALS as usize);
                padded.parse::<i64>().map_err(|_| invalid())?
            }
        };

        let total = units
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(overflow)?;

        Ok(Amount(if negative { -total } else { total }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Amount::new(0).to_string(), "0");
        assert_eq!(Amount::new(1).to_string(), "0.000001");
        assert_eq!(Amount::new(29_000).to_string(), "0.029");
        assert_eq!(Amount::new(1_500_000).to_string(), "1.5");
        assert_eq!(Amount::new(10_000_000).to_string(), "10");
        assert_eq!(Amount::new(-500_000).to_string(), "-0.5");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Amount>().unwrap(), Amount::new(10_000_000));
        assert_eq!("0.029".parse::<Amount>().unwrap().micros(), 29_000);
        assert_eq!("1,1".parse::<Amount>().unwrap().micros(), 1_100_000);
        assert_eq!("-0.5".parse::<Amount>().unwrap().micros(), -500_000);
        assert_eq!("+2.".parse::<Amount>().unwrap().micros(), 2_000_000);
        assert_eq!("  0.01 ".parse::<Amount>().unwrap().micros(), 10_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Amount>().is_err());
        assert!("-".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!(".5".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert!("0.0000001".parse::<Amount>().is_err());
        assert!("99999999999999999999".parse::<Amount>().is_err());
    }

    #[test]
    fn remaining_never_goes_negative() {
        let allocated = Amount::new(2_000_000);
        assert_eq!(
            allocated.saturating_remaining(Amount::new(1_800_000)),
            Amount::new(200_000)
        );
        assert_eq!(
            allocated.saturating_remaining(Amount::new(3_000_000)),
            Amount::ZERO
        );
    }
}
