//! Currency amounts as integer cents.

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub},
    str::FromStr,
};

/// Signed money amount represented as **integer cents**.
///
/// Balances, expense amounts and transaction amounts all use this type so
/// that replaying a wallet's history gives back its balance exactly.
///
/// ```rust
/// use expense_ledger::Money;
///
/// let lunch: Money = "12.50".parse().unwrap();
/// assert_eq!(lunch.cents(), 1250);
/// assert_eq!(lunch.to_string(), "$12.50");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero cents.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from integer cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Strictly greater than zero.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Strictly less than zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parses a decimal string such as `"12.50"` into cents.
    ///
    /// Accepts `.` or `,` as decimal separator, an optional leading `+`/`-`
    /// and an optional leading `$`. Rejects more than two fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::invalid_input(format!("\"{s}\" is not a valid amount"));

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(stripped) => (true, stripped),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let rest = rest.trim_start().strip_prefix('$').unwrap_or(rest).replace(',', ".");
        if rest.is_empty() {
            return Err(Error::invalid_input("amount is empty"));
        }

        let (whole, fraction) = rest.split_once('.').unwrap_or((rest.as_str(), ""));
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            2 => fraction.parse().map_err(|_| invalid())?,
            _ => return Err(Error::invalid_input("amounts have at most two decimals")),
        };

        let total = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| Error::invalid_input("amount too large"))?;

        Ok(Self(if negative { -total } else { total }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_display_formats_dollars() {
        assert_eq!(Money::from_cents(0).to_string(), "$0.00");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(8750).to_string(), "$87.50");
        assert_eq!(Money::from_cents(-105).to_string(), "-$1.05");
    }

    #[test]
    fn test_parse_accepts_common_inputs() {
        assert_eq!("10".parse::<Money>().unwrap().cents(), 1000);
        assert_eq!("12.5".parse::<Money>().unwrap().cents(), 1250);
        assert_eq!("12,50".parse::<Money>().unwrap().cents(), 1250);
        assert_eq!("$200.00".parse::<Money>().unwrap().cents(), 20000);
        assert_eq!(" +3 ".parse::<Money>().unwrap().cents(), 300);
        assert_eq!("-0.01".parse::<Money>().unwrap().cents(), -1);
        assert_eq!("7.".parse::<Money>().unwrap().cents(), 700);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
        assert!("12.345".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
        assert!(matches!(
            "99999999999999999999".parse::<Money>(),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_sum_and_checked_ops() {
        let amounts = [Money::from_cents(100), Money::from_cents(250)];
        assert_eq!(amounts.iter().sum::<Money>(), Money::from_cents(350));
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
        assert_eq!(
            Money::from_cents(100).checked_sub(Money::from_cents(30)),
            Some(Money::from_cents(70))
        );
    }
}
