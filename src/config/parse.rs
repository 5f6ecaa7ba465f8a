//! Value parsing for configuration files

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{self, Currency},
};

use crate::config::ConfigError;

/// Parse a non-negative decimal amount or rate (e.g., "1650" or "0.85").
///
/// # Errors
///
/// Returns [`ConfigError::InvalidAmount`] if the string is not a decimal number or is
/// negative.
pub fn parse_decimal(s: &str) -> Result<Decimal, ConfigError> {
    let value = s
        .trim()
        .parse::<Decimal>()
        .map_err(|_err| ConfigError::InvalidAmount(s.to_string()))?;

    if value < Decimal::ZERO {
        return Err(ConfigError::InvalidAmount(s.to_string()));
    }

    Ok(value)
}

/// Parse a catalog price string (e.g., "299.00 USD").
///
/// Catalog prices are authored in USD, so any other currency is rejected.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPrice`] if the format is wrong, the amount is negative
/// or the currency is not USD.
pub fn parse_usd_price(s: &str) -> Result<Money<'static, Currency>, ConfigError> {
    let invalid = || ConfigError::InvalidPrice(s.to_string());

    let mut parts = s.split_whitespace();

    let (Some(amount), Some("USD"), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };

    let amount = amount.parse::<Decimal>().map_err(|_err| invalid())?;

    if amount < Decimal::ZERO {
        return Err(invalid());
    }

    let minor_units = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(invalid)?;

    Ok(Money::from_minor(minor_units, iso::USD))
}

/// Parse percentage string (e.g., "15%" or "0.15") into a `Percentage`
///
/// Accepts two formats:
/// - Percentage format: "15%" for 15%
/// - Decimal format: "0.15" for 15%
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPercentage`] if the string cannot be parsed.
pub fn parse_percentage(s: &str) -> Result<Percentage, ConfigError> {
    let trimmed = s.trim();

    let value = if let Some(points) = trimmed.strip_suffix('%') {
        points
            .trim()
            .parse::<Decimal>()
            .map(|points| points / Decimal::ONE_HUNDRED)
    } else {
        trimmed.parse::<Decimal>()
    };

    value
        .map(Percentage::from)
        .map_err(|_err| ConfigError::InvalidPercentage(s.to_string()))
}
