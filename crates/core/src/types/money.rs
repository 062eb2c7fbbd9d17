//! Kenyan shilling amounts.
//!
//! Balances, rental prices and withdrawal amounts are all KES. The backend
//! sends them as JSON numbers or decimal strings; both deserialize into
//! [`Kes`] without going through floating point.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Smallest amount a user may withdraw, in KES.
pub const MINIMUM_WITHDRAWAL_KES: u32 = 300;

/// An amount of Kenyan shillings.
///
/// Display renders as `KSh 1,234.50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kes(Decimal);

impl Kes {
    /// Zero shillings.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Whole shillings.
    #[must_use]
    pub fn from_shillings(amount: u32) -> Self {
        Self(Decimal::from(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Absolute value, used when a signed ledger entry is shown as a plain amount.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// True when the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// The amount rounded to cents without the currency prefix, e.g. `1,234.50`.
    #[must_use]
    pub fn grouped(&self) -> String {
        group_thousands(self.0)
    }
}

impl fmt::Display for Kes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KSh {}", self.grouped())
    }
}

impl From<Decimal> for Kes {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl core::ops::Add for Kes {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::iter::Sum for Kes {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

/// Half-cents round away from zero.
fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn group_thousands(amount: Decimal) -> String {
    let rounded = to_cents(amount);
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{cents}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn kes(s: &str) -> Kes {
        Kes::new(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(kes("1234567.5").to_string(), "KSh 1,234,567.50");
        assert_eq!(kes("999").to_string(), "KSh 999.00");
        assert_eq!(kes("1000").to_string(), "KSh 1,000.00");
        assert_eq!(Kes::ZERO.to_string(), "KSh 0.00");
    }

    #[test]
    fn test_display_negative() {
        assert_eq!(kes("-2500.125").to_string(), "KSh -2,500.13");
        assert_eq!(kes("-0.001").to_string(), "KSh 0.00");
    }

    #[test]
    fn test_display_rounds_half_cents_up() {
        assert_eq!(kes("2.345").to_string(), "KSh 2.35");
        assert_eq!(kes("0.005").to_string(), "KSh 0.01");
        assert_eq!(kes("2.344").to_string(), "KSh 2.34");
    }

    #[test]
    fn test_deserializes_numbers_and_strings() {
        let from_number: Kes = serde_json::from_str("1200.5").unwrap();
        let from_string: Kes = serde_json::from_str("\"1200.50\"").unwrap();
        assert_eq!(from_number, from_string);
    }

    #[test]
    fn test_abs_and_sign() {
        assert_eq!(kes("-300").abs(), kes("300"));
        assert!(kes("0.01").is_positive());
        assert!(!Kes::ZERO.is_positive());
        assert!(!kes("-1").is_positive());
    }

    #[test]
    fn test_sum() {
        let total: Kes = [kes("100"), kes("250.25"), kes("0.75")].into_iter().sum();
        assert_eq!(total, kes("351"));
    }
}
