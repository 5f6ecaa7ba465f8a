//! Discount arithmetic
//!
//! Minor-unit helpers shared by coupons, tax and bulk tiers. Intermediate values stay
//! in [`Decimal`] so an order can be rounded once, at the end.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::MoneyError;
use thiserror::Error;

/// Errors specific to discount calculations.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Calculate `percent` of a minor unit amount without rounding.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the multiplication overflows.
pub fn percent_of_minor_exact(
    percent: &Percentage,
    minor: Decimal,
) -> Result<Decimal, DiscountError> {
    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)
}

/// Calculate the discount amount in minor units based on a percentage and a minor unit amount.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the percentage calculation overflows
/// or cannot be represented in minor units.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    round_minor(percent_of_minor_exact(percent, minor)?)
}

/// Round a fractional minor unit amount to a whole minor unit.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the result does not fit an `i64`.
pub fn round_minor(value: Decimal) -> Result<i64, DiscountError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// Express a percentage in points, e.g. `0.15` becomes `15`.
pub fn percent_points(percent: &Percentage) -> Decimal {
    (*percent) * Decimal::ONE_HUNDRED
}

/// Build a percentage from points, e.g. `15` becomes 15%.
pub fn percent_from_points(points: u32) -> Percentage {
    Percentage::from(Decimal::from(points) / Decimal::ONE_HUNDRED)
}

/// Whether a percentage sits within `0%..=100%`.
pub fn is_unit_percentage(percent: &Percentage) -> bool {
    let value = (*percent) * Decimal::ONE;

    value >= Decimal::ZERO && value <= Decimal::ONE
}
