//! Monetary amounts.
//!
//! Amounts are stored and logged as `Cents` (integer minor units) so ledger
//! arithmetic is exact. Decimal text only exists at the SQL edge, where it is
//! parsed and formatted through `rust_decimal`.

use std::str::FromStr;

use rust_decimal::prelude::*;

/// Integer minor currency units. The only money type.
pub type Cents = i64;

/// Two fractional digits, half away from zero.
const DECIMAL_PLACES: u32 = 2;

#[derive(Debug, PartialEq, Eq)]
pub enum MoneyError {
    Malformed(String),
    TooPrecise(String),
    OutOfRange(String),
}

impl std::fmt::Display for MoneyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoneyError::Malformed(s) => write!(f, "not a decimal amount: {s}"),
            MoneyError::TooPrecise(s) => {
                write!(f, "amount {s} has more than {DECIMAL_PLACES} decimal places")
            }
            MoneyError::OutOfRange(s) => write!(f, "amount {s} out of range"),
        }
    }
}

impl std::error::Error for MoneyError {}

/// Parse `"1500"`, `"1500.5"` or `"1500.50"` into cents.
pub fn parse_cents(text: &str) -> Result<Cents, MoneyError> {
    let trimmed = text.trim();
    let value =
        Decimal::from_str(trimmed).map_err(|_| MoneyError::Malformed(trimmed.to_string()))?;
    let value = value.normalize();
    if value.scale() > DECIMAL_PLACES {
        return Err(MoneyError::TooPrecise(trimmed.to_string()));
    }
    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| MoneyError::OutOfRange(trimmed.to_string()))
}

/// Render cents as a two-place decimal string, e.g. `150050` → `"1500.50"`.
pub fn format_cents(amount: Cents) -> String {
    Decimal::new(amount, DECIMAL_PLACES).to_string()
}

/// `amount × bps / 10_000`, rounded half away from zero to whole cents.
pub fn apply_rate_bps(amount: Cents, bps: u32) -> Option<Cents> {
    let scaled = Decimal::from(amount).checked_mul(Decimal::from(bps))? / Decimal::from(10_000);
    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_and_fractional() {
        assert_eq!(parse_cents("1500").unwrap(), 150_000);
        assert_eq!(parse_cents("1500.5").unwrap(), 150_050);
        assert_eq!(parse_cents(" 0.01 ").unwrap(), 1);
        assert_eq!(parse_cents("12.30").unwrap(), 1_230);
    }

    #[test]
    fn parse_rejects_sub_cent_precision() {
        assert!(matches!(parse_cents("1.005"), Err(MoneyError::TooPrecise(_))));
    }

    #[test]
    fn trailing_zeros_are_not_extra_precision() {
        assert_eq!(parse_cents("2.5000").unwrap(), 250);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_cents("ten"), Err(MoneyError::Malformed(_))));
        assert!(matches!(parse_cents(""), Err(MoneyError::Malformed(_))));
    }

    #[test]
    fn parse_rejects_amounts_beyond_range() {
        assert!(matches!(
            parse_cents("79228162514264337593543950335"),
            Err(MoneyError::OutOfRange(_))
        ));
        assert!(matches!(parse_cents("-79228162514264337593543950335"), Err(MoneyError::OutOfRange(_))));
        assert!(matches!(parse_cents("92233720368547758.08"), Err(MoneyError::OutOfRange(_))));
    }

    #[test]
    fn format_pads_to_two_places() {
        assert_eq!(format_cents(150_050), "1500.50");
        assert_eq!(format_cents(7), "0.07");
        assert_eq!(format_cents(0), "0.00");
    }

    #[test]
    fn rate_rounds_half_up() {
        // 10% of 12.35 = 1.235 → 1.24
        assert_eq!(apply_rate_bps(1_235, 1_000), Some(124));
        // 10% of 12.34 = 1.234 → 1.23
        assert_eq!(apply_rate_bps(1_234, 1_000), Some(123));
        assert_eq!(apply_rate_bps(50_000, 0), Some(0));
    }
}
