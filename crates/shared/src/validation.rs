//! Common validation utilities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use validator::ValidationError;

/// Money columns carry two fractional digits.
pub const MONEY_SCALE: u32 = 2;

/// Maximum scheduling horizon for meetings and cycles, in days.
const MAX_SCHEDULE_HORIZON_DAYS: i64 = 730;

/// Validates that a monetary amount is strictly positive.
pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        let mut err = ValidationError::new("amount_positive");
        err.message = Some("Amount must be greater than zero".into());
        Err(err)
    }
}

/// Validates that a monetary amount has at most two fractional digits.
pub fn validate_money_scale(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.normalize().scale() <= MONEY_SCALE {
        Ok(())
    } else {
        let mut err = ValidationError::new("amount_scale");
        err.message = Some("Amount must have at most two decimal places".into());
        Err(err)
    }
}

/// Positive amount with at most two decimal places.
pub fn validate_money(amount: &Decimal) -> Result<(), ValidationError> {
    validate_positive_amount(amount)?;
    validate_money_scale(amount)
}

/// Validates that an interest rate is a fraction in `0..=1`.
pub fn validate_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate >= Decimal::ZERO && *rate <= Decimal::ONE {
        Ok(())
    } else {
        let mut err = ValidationError::new("rate_range");
        err.message = Some("Interest rate must be between 0 and 1".into());
        Err(err)
    }
}

/// Validates that a scheduled time is not absurdly far in the future.
pub fn validate_schedule_horizon(at: &DateTime<Utc>) -> Result<(), ValidationError> {
    let limit = Utc::now() + chrono::Duration::days(MAX_SCHEDULE_HORIZON_DAYS);
    if *at <= limit {
        Ok(())
    } else {
        let mut err = ValidationError::new("schedule_horizon");
        err.message = Some("Date cannot be more than two years ahead".into());
        Err(err)
    }
}

/// Rounds an amount to money precision, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Truncates an amount to money precision (never rounds up).
pub fn floor_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, rust_decimal::RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_positive_amount() {
        assert!(validate_positive_amount(&dec!(0.01)).is_ok());
        assert!(validate_positive_amount(&dec!(1200)).is_ok());
        assert!(validate_positive_amount(&dec!(0)).is_err());
        assert!(validate_positive_amount(&dec!(-5)).is_err());
    }

    #[test]
    fn test_validate_positive_amount_message() {
        let err = validate_positive_amount(&dec!(0)).unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Amount must be greater than zero"
        );
    }

    #[test]
    fn test_validate_money_scale() {
        assert!(validate_money_scale(&dec!(10.25)).is_ok());
        assert!(validate_money_scale(&dec!(10.250)).is_ok());
        assert!(validate_money_scale(&dec!(10.255)).is_err());
    }

    #[test]
    fn test_validate_money_combines_checks() {
        assert!(validate_money(&dec!(500)).is_ok());
        assert!(validate_money(&dec!(-500)).is_err());
        assert!(validate_money(&dec!(0.001)).is_err());
    }

    #[test]
    fn test_validate_rate() {
        assert!(validate_rate(&dec!(0)).is_ok());
        assert!(validate_rate(&dec!(0.1)).is_ok());
        assert!(validate_rate(&dec!(1)).is_ok());
        assert!(validate_rate(&dec!(1.01)).is_err());
        assert!(validate_rate(&dec!(-0.01)).is_err());
    }

    #[test]
    fn test_validate_schedule_horizon() {
        assert!(validate_schedule_horizon(&(Utc::now() + chrono::Duration::days(30))).is_ok());
        assert!(validate_schedule_horizon(&(Utc::now() + chrono::Duration::days(1000))).is_err());
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(dec!(10000)), dec!(10000));
        assert_eq!(round_money(dec!(3333.335)), dec!(3333.34));
        assert_eq!(round_money(dec!(3333.334)), dec!(3333.33));
    }

    #[test]
    fn test_floor_money() {
        assert_eq!(floor_money(dec!(3.339)), dec!(3.33));
        assert_eq!(floor_money(dec!(10)), dec!(10));
    }
}
