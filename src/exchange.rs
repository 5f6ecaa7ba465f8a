//! Currency conversion
//!
//! Catalog prices are authored in USD. [`ExchangeRates`] converts them into the display
//! currency, rounding once to the target currency's minor unit. Conversion only ever
//! runs from USD; there is no currency-to-currency path.

use rust_decimal::{Decimal, prelude::FromPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use thiserror::Error;
use tracing::warn;

use crate::{
    currency::CurrencyCode,
    discounts::{DiscountError, round_minor},
};

/// Errors raised while building rate tables or converting amounts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExchangeError {
    /// Amounts to convert must be authored in USD.
    #[error("conversion source must be USD, got {0}")]
    SourceNotUsd(String),

    /// Negative amounts have no catalog meaning.
    #[error("cannot convert a negative amount: {0}")]
    NegativeAmount(Decimal),

    /// Exchange rates must be strictly positive.
    #[error("exchange rate for {0} must be positive, got {1}")]
    NonPositiveRate(CurrencyCode, Decimal),

    /// The USD row is the base of the table and must be exactly one.
    #[error("USD base rate must be 1, got {0}")]
    InvalidBaseRate(Decimal),

    /// The converted amount does not fit in minor units.
    #[error("converted amount overflowed")]
    Overflow,
}

impl From<DiscountError> for ExchangeError {
    fn from(_error: DiscountError) -> Self {
        ExchangeError::Overflow
    }
}

/// Exchange-rate table keyed by display currency, with USD as the base.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRates {
    rates: FxHashMap<CurrencyCode, Decimal>,
}

impl ExchangeRates {
    /// Build a rate table. A missing USD row is added with rate one.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::NonPositiveRate`]: a rate is zero or negative.
    /// - [`ExchangeError::InvalidBaseRate`]: the USD row is present but not one.
    pub fn new(
        rates: impl IntoIterator<Item = (CurrencyCode, Decimal)>,
    ) -> Result<Self, ExchangeError> {
        let mut table = FxHashMap::default();

        for (code, rate) in rates {
            if rate <= Decimal::ZERO {
                return Err(ExchangeError::NonPositiveRate(code, rate));
            }

            if code == CurrencyCode::Usd && rate != Decimal::ONE {
                return Err(ExchangeError::InvalidBaseRate(rate));
            }

            table.insert(code, rate);
        }

        table.entry(CurrencyCode::Usd).or_insert(Decimal::ONE);

        Ok(Self { rates: table })
    }

    /// Rate for `code`, if the table carries one.
    pub fn rate(&self, code: CurrencyCode) -> Option<Decimal> {
        self.rates.get(&code).copied()
    }

    /// Whether prices can be shown in `code` without falling back.
    pub fn supports(&self, code: CurrencyCode) -> bool {
        self.rates.contains_key(&code)
    }

    /// Resolve the currency that will actually be displayed for `target`, together with
    /// its rate. Targets missing from the table fall back to USD at rate one.
    pub fn effective(&self, target: CurrencyCode) -> (CurrencyCode, Decimal) {
        if let Some(rate) = self.rate(target) {
            (target, rate)
        } else {
            warn!(currency = %target, "no exchange rate configured; falling back to USD");

            (CurrencyCode::Usd, Decimal::ONE)
        }
    }

    /// Convert a USD amount into `target`, rounded to the target's minor unit.
    ///
    /// The returned money is denominated in the effective currency, which is USD when
    /// `target` has no rate.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::SourceNotUsd`]: `amount` is not in USD.
    /// - [`ExchangeError::NegativeAmount`]: `amount` is below zero.
    /// - [`ExchangeError::Overflow`]: the result cannot be represented.
    pub fn convert(
        &self,
        amount: &Money<'static, Currency>,
        target: CurrencyCode,
    ) -> Result<Money<'static, Currency>, ExchangeError> {
        if amount.currency() != iso::USD {
            return Err(ExchangeError::SourceNotUsd(
                amount.currency().iso_alpha_code.to_string(),
            ));
        }

        let (effective, _rate) = self.effective(target);
        let minor = round_minor(self.convert_minor_exact(amount.to_minor_units(), effective)?)?;

        Ok(Money::from_minor(minor, effective.iso()))
    }

    /// Convert USD minor units into fractional minor units of `target`, without rounding
    /// and without falling back.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::NegativeAmount`]: `usd_minor` is below zero.
    /// - [`ExchangeError::Overflow`]: the result cannot be represented.
    pub(crate) fn convert_minor_exact(
        &self,
        usd_minor: i64,
        target: CurrencyCode,
    ) -> Result<Decimal, ExchangeError> {
        let (effective, rate) = self.effective(target);
        let minor = Decimal::from_i64(usd_minor).ok_or(ExchangeError::Overflow)?;

        if minor < Decimal::ZERO {
            return Err(ExchangeError::NegativeAmount(minor));
        }

        minor
            .checked_mul(rate)
            .and_then(|value| value.checked_mul(minor_unit_scale(effective.iso())?))
            .and_then(|value| value.checked_div(minor_unit_scale(iso::USD)?))
            .ok_or(ExchangeError::Overflow)
    }

    /// Convert a fixed major-unit USD amount (e.g. a `50` coupon) into minor units of
    /// `target`, without rounding.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Overflow`] if the result cannot be represented.
    pub(crate) fn convert_major_exact(
        &self,
        usd_major: Decimal,
        target: CurrencyCode,
    ) -> Result<Decimal, ExchangeError> {
        let (effective, rate) = self.effective(target);

        usd_major
            .checked_mul(rate)
            .and_then(|value| value.checked_mul(minor_unit_scale(effective.iso())?))
            .ok_or(ExchangeError::Overflow)
    }

    /// Iterate the configured rates.
    pub fn iter(&self) -> impl Iterator<Item = (CurrencyCode, Decimal)> + '_ {
        self.rates.iter().map(|(code, rate)| (*code, *rate))
    }
}

/// Number of minor units in one major unit of `currency`, e.g. 100 for USD.
pub fn minor_unit_scale(currency: &Currency) -> Option<Decimal> {
    10_i64
        .checked_pow(currency.exponent)
        .and_then(Decimal::from_i64)
}

/// Render money with its currency symbol and separators.
///
/// Symbol placement and separators follow each currency's locale in the ISO table:
/// USD, GBP, NGN, ZAR and KES group thousands with `,` and use `.` for the minor unit
/// (`₦972,015.00`), while EUR groups with `.` and uses `,` (`€1.254,15`). The symbol is
/// the one [`CurrencyCode::symbol`] reports.
pub fn format_money(money: &Money<'_, Currency>) -> String {
    money.to_string()
}
