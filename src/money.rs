use crate::error::{ForecastError, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Currency amounts and balances. Exact decimal, displayed to two places.
pub type Money = Decimal;

pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Rounds to whole cents using banker's rounding.
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Converts a floating-point intermediate into money without rounding it.
pub fn to_money(value: f64) -> Result<Money> {
    if !value.is_finite() {
        return Err(ForecastError::NonFiniteAmount(format!("{value}")));
    }
    Decimal::from_f64(value)
        .ok_or_else(|| ForecastError::NonFiniteAmount(format!("{value} is out of decimal range")))
}

/// Converts a floating-point intermediate into money rounded to the cent.
pub fn to_money_rounded(value: f64) -> Result<Money> {
    to_money(value).map(round_money)
}

pub fn to_float(value: Money) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Fixed payment that amortizes `principal` over `periods` at `rate` per period.
///
/// A zero rate degenerates to an even split of the principal.
pub fn amortized_payment(principal: Money, rate: f64, periods: u32) -> Result<Money> {
    if periods == 0 {
        return Err(ForecastError::InvalidConfiguration(
            "Amortization needs at least one period".to_string(),
        ));
    }
    if rate == 0.0 {
        return Ok(round_money(principal / Decimal::from(periods)));
    }
    let denominator = to_money(1.0 - (1.0 + rate).powi(-(periods as i32)))?;
    if denominator.is_zero() {
        return Err(ForecastError::NonFiniteAmount(format!(
            "Amortization denominator vanished for rate {rate}"
        )));
    }
    Ok(round_money(principal * to_money(rate)? / denominator))
}
