//! Money helpers.
//!
//! Amounts are `rust_decimal::Decimal` values in the currency's major unit
//! (rupees, dollars). Payment processors want integer minor units (paise,
//! cents), which [`to_minor_units`] produces.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Errors converting money amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Amount is below zero.
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),

    /// Amount does not fit the processor's integer range.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// Decimal places a major-unit amount may carry.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Whether `amount` is a whole number of minor units.
///
/// Finer amounts cannot be charged exactly.
#[must_use]
pub fn fits_minor_units(amount: Decimal) -> bool {
    amount.normalize().scale() <= MINOR_UNIT_SCALE
}

/// Convert a major-unit amount to minor units (× 100), rounding half away
/// from zero.
///
/// # Errors
///
/// Returns `MoneyError::Negative` for negative amounts and
/// `MoneyError::OutOfRange` if the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }

    let scaled = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(MoneyError::OutOfRange(amount))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    scaled.to_i64().ok_or(MoneyError::OutOfRange(amount))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_whole_amount() {
        assert_eq!(to_minor_units(Decimal::from(30)).unwrap(), 3000);
    }

    #[test]
    fn test_fractional_amount_rounds_half_up() {
        assert_eq!(to_minor_units(Decimal::from_str("12.345").unwrap()).unwrap(), 1235);
        assert_eq!(to_minor_units(Decimal::from_str("12.344").unwrap()).unwrap(), 1234);
        assert_eq!(to_minor_units(Decimal::from_str("0.005").unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_zero_is_allowed() {
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_fits_minor_units() {
        assert!(fits_minor_units(Decimal::from(30)));
        assert!(fits_minor_units(Decimal::from_str("89.50").unwrap()));
        assert!(fits_minor_units(Decimal::from_str("89.5000").unwrap()));
        assert!(!fits_minor_units(Decimal::from_str("0.005").unwrap()));
    }

    #[test]
    fn test_negative_rejected() {
        let err = to_minor_units(Decimal::from(-1)).unwrap_err();
        assert!(matches!(err, MoneyError::Negative(_)));
    }
}
