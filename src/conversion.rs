//! Currency conversion arithmetic and amount validation.
//!
//! All money leaving this module is rounded to 2 decimal places
//! (half away from zero). Stored balances are integer hundredths, so
//! the minor-unit helpers here are the only place that scaling happens.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::types::KantorError;

/// Decimal places kept for every stored or returned amount.
pub const MONEY_DP: u32 = 2;

/// Largest amount accepted in a single top-up or exchange request.
pub const MAX_AMOUNT: Decimal = dec!(1000000000);

/// Round to the money precision.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert `amount` with a direct rate: `amount × rate`, rounded.
///
/// Negative amounts convert to zero. An overflowing product also yields
/// zero, which callers treat as "nothing to credit".
pub fn calculate_exchange(amount: Decimal, rate: Decimal) -> Decimal {
    if amount.is_sign_negative() {
        return Decimal::ZERO;
    }
    amount.checked_mul(rate).map(round_money).unwrap_or(Decimal::ZERO)
}

/// Convert through a common base: `amount / rate_from × rate_to`, rounded.
///
/// Both rates are quoted against the same base currency. Zero or negative
/// inputs yield zero.
pub fn calculate_cross_exchange(amount: Decimal, rate_from: Decimal, rate_to: Decimal) -> Decimal {
    if amount <= Decimal::ZERO || rate_from <= Decimal::ZERO || rate_to <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    amount
        .checked_div(rate_from)
        .and_then(|base| base.checked_mul(rate_to))
        .map(round_money)
        .unwrap_or(Decimal::ZERO)
}

/// True only for JSON numbers strictly greater than zero.
///
/// Numeric strings such as `"100"` are rejected, like any other non-number.
pub fn validate_amount(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64().is_some_and(|f| f.is_finite() && f > 0.0),
        _ => false,
    }
}

/// Validate a request amount and turn it into a rounded `Decimal`.
///
/// Amounts that round to zero at money precision, or exceed
/// [`MAX_AMOUNT`], are rejected.
pub fn parse_amount(value: &Value) -> Result<Decimal, KantorError> {
    if !validate_amount(value) {
        return Err(KantorError::InvalidAmount);
    }
    let text = value.to_string();
    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| KantorError::InvalidAmount)?;

    let amount = round_money(amount);
    if amount <= Decimal::ZERO || amount > MAX_AMOUNT {
        return Err(KantorError::InvalidAmount);
    }
    Ok(amount)
}

/// Scale an amount to integer hundredths for storage.
pub fn to_minor_units(amount: Decimal) -> Result<i64, KantorError> {
    round_money(amount)
        .checked_mul(dec!(100))
        .and_then(|scaled| scaled.to_i64())
        .ok_or(KantorError::InvalidAmount)
}

/// Inverse of [`to_minor_units`].
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MONEY_DP)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_calculate_exchange_multiplies() {
        assert_eq!(calculate_exchange(dec!(100), dec!(4.0)), dec!(400));
    }

    #[test]
    fn test_calculate_exchange_rounds_to_cents() {
        assert_eq!(calculate_exchange(dec!(10), dec!(3.14159)), dec!(31.42));
        assert_eq!(calculate_exchange(dec!(1), dec!(0.125)), dec!(0.13));
    }

    #[test]
    fn test_calculate_exchange_negative_amount_is_zero() {
        assert_eq!(calculate_exchange(dec!(-5), dec!(4)), Decimal::ZERO);
    }

    #[test]
    fn test_calculate_exchange_overflow_is_zero() {
        assert_eq!(calculate_exchange(Decimal::MAX, dec!(2)), Decimal::ZERO);
    }

    #[test]
    fn test_cross_exchange() {
        // 100 PLN -> USD with PLN=4.0, USD=1.0 against a USD base
        assert_eq!(calculate_cross_exchange(dec!(100), dec!(4.0), dec!(1.0)), dec!(25));
        assert_eq!(calculate_cross_exchange(dec!(10), dec!(3), dec!(1)), dec!(3.33));
    }

    #[test]
    fn test_cross_exchange_rejects_bad_inputs() {
        assert_eq!(calculate_cross_exchange(dec!(0), dec!(4), dec!(1)), Decimal::ZERO);
        assert_eq!(calculate_cross_exchange(dec!(-1), dec!(4), dec!(1)), Decimal::ZERO);
        assert_eq!(calculate_cross_exchange(dec!(10), dec!(0), dec!(1)), Decimal::ZERO);
        assert_eq!(calculate_cross_exchange(dec!(10), dec!(4), dec!(-1)), Decimal::ZERO);
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(&json!(100)));
        assert!(validate_amount(&json!(0.01)));
        assert!(!validate_amount(&json!(-5)));
        assert!(!validate_amount(&json!(0)));
        assert!(!validate_amount(&json!("100")));
        assert!(!validate_amount(&json!(null)));
        assert!(!validate_amount(&json!(true)));
        assert!(!validate_amount(&json!([100])));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&json!(100)).unwrap(), dec!(100));
        assert_eq!(parse_amount(&json!(12.345)).unwrap(), dec!(12.35));
        assert_eq!(parse_amount(&json!(0.1)).unwrap(), dec!(0.1));
    }

    #[test]
    fn test_parse_amount_rejects_sub_cent() {
        assert!(matches!(parse_amount(&json!(0.001)), Err(KantorError::InvalidAmount)));
    }

    #[test]
    fn test_parse_amount_rejects_non_numbers() {
        assert!(matches!(parse_amount(&json!("5")), Err(KantorError::InvalidAmount)));
        assert!(matches!(parse_amount(&json!(-1.5)), Err(KantorError::InvalidAmount)));
    }

    #[test]
    fn test_parse_amount_rejects_huge() {
        assert!(parse_amount(&json!(1e300)).is_err());
        assert!(matches!(parse_amount(&json!(90000000000000000u64)), Err(KantorError::InvalidAmount)));
    }

    #[test]
    fn test_parse_amount_cap_is_inclusive() {
        assert_eq!(parse_amount(&json!(1000000000)).unwrap(), MAX_AMOUNT);
        assert!(matches!(parse_amount(&json!(1000000000.01)), Err(KantorError::InvalidAmount)));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(dec!(12.34)).unwrap(), 1234);
        assert_eq!(to_minor_units(dec!(100)).unwrap(), 10000);
        assert_eq!(from_minor_units(1234), dec!(12.34));
        assert_eq!(from_minor_units(0), Decimal::ZERO);
    }

    #[test]
    fn test_minor_units_overflow() {
        assert!(to_minor_units(Decimal::MAX).is_err());
    }
}
