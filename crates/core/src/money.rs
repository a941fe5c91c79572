use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An unsigned-by-convention statement amount, held at two decimal places.
///
/// Direction lives on [`crate::TxnType`]; a `Money` produced by the extractors
/// is always the magnitude printed on the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    /// Saturates to zero for values outside the `i64` range.
    pub fn to_cents(self) -> i64 {
        self.0
            .checked_mul(Decimal::from(100))
            .and_then(|c| c.round().to_i64())
            .unwrap_or_default()
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// Parse a statement amount such as `7,930.00`, `₹ 1,200` or `Rs.45.5`.
    ///
    /// Thousands separators, currency markers and surrounding whitespace are
    /// ignored. Returns `None` for anything that is not a plain decimal after
    /// cleanup.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .trim_start_matches('₹')
            .trim_start_matches("INR")
            .trim_start_matches("Rs.")
            .trim_start_matches("Rs")
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return None;
        }
        Decimal::from_str(&cleaned).ok().map(Money::from_decimal)
    }

    /// `None` when the result does not fit in a `Decimal`.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    pub fn abs_diff(self, other: Money) -> Option<Money> {
        self.checked_sub(other).map(|d| Money(d.0.abs()))
    }
}

impl FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s).ok_or_else(|| format!("Invalid amount: '{s}'"))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_separators_and_markers() {
        assert_eq!(Money::parse("7,930.00"), Some(Money::from_cents(793_000)));
        assert_eq!(Money::parse("₹ 1,200"), Some(Money::from_cents(120_000)));
        assert_eq!(Money::parse("Rs.45.5"), Some(Money::from_cents(4_550)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money::parse("7O0.5O"), None);
        assert_eq!(Money::parse("abc"), None);
    }

    #[test]
    fn display_is_two_places() {
        assert_eq!(Money::from_cents(7500).to_string(), "75.00");
        assert_eq!(Money::parse("110").unwrap().to_string(), "110.00");
    }

    #[test]
    fn cents_survive_parse() {
        assert_eq!(Money::parse("601.54").unwrap().to_cents(), 60_154);
    }

    #[test]
    fn abs_diff_is_symmetric() {
        let a = Money::from_cents(100);
        let b = Money::from_cents(350);
        assert_eq!(a.abs_diff(b), b.abs_diff(a));
        assert_eq!(a.abs_diff(b), Some(Money::from_cents(250)));
    }

    #[test]
    fn arithmetic_at_the_decimal_limit_does_not_panic() {
        let huge = Money::parse("79228162514264337593543950335").unwrap();
        assert_eq!(huge.checked_add(Money::from_cents(100)), None);
        assert_eq!(Money::zero().checked_sub(huge).unwrap().checked_sub(huge), None);
        assert_eq!(huge.to_cents(), 0);
        assert_eq!(Money::from_cents(500).checked_sub(Money::from_cents(125)), Some(Money::from_cents(375)));
    }
}
