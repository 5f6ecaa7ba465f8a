//! Tax
//!
//! Tax is charged per display currency, standing in for the shopper's jurisdiction. The
//! default table only carries Nigerian VAT; every other currency is untaxed.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    currency::CurrencyCode,
    discounts::{DiscountError, is_unit_percentage, percent_of_minor_exact, round_minor},
};

/// Errors raised by tax tables and calculations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaxError {
    /// Tax rates must sit within `0%..=100%`.
    #[error("tax rate for {0} must be between 0% and 100%")]
    RateOutOfRange(CurrencyCode),

    /// Tax is never charged on negative amounts.
    #[error("cannot tax a negative amount")]
    NegativeAmount,

    /// The tax amount could not be represented in minor units.
    #[error("tax amount overflowed")]
    Overflow,
}

impl From<DiscountError> for TaxError {
    fn from(_error: DiscountError) -> Self {
        TaxError::Overflow
    }
}

/// Tax rates keyed by display currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxTable {
    rates: FxHashMap<CurrencyCode, Percentage>,
}

impl TaxTable {
    /// Build a tax table.
    ///
    /// # Errors
    ///
    /// Returns [`TaxError::RateOutOfRange`] for rates outside `0%..=100%`.
    pub fn new(
        rates: impl IntoIterator<Item = (CurrencyCode, Percentage)>,
    ) -> Result<Self, TaxError> {
        let mut table = FxHashMap::default();

        for (code, rate) in rates {
            if !is_unit_percentage(&rate) {
                return Err(TaxError::RateOutOfRange(code));
            }

            table.insert(code, rate);
        }

        Ok(Self { rates: table })
    }

    /// Rate charged for `currency`; zero when the table has no entry.
    pub fn rate(&self, currency: CurrencyCode) -> Percentage {
        self.rates
            .get(&currency)
            .copied()
            .unwrap_or_else(|| Percentage::from(Decimal::ZERO))
    }

    /// Whether any tax is charged for `currency`.
    pub fn is_taxed(&self, currency: CurrencyCode) -> bool {
        self.rates
            .get(&currency)
            .is_some_and(|rate| (*rate) * Decimal::ONE > Decimal::ZERO)
    }

    /// Tax due on a post-discount amount, rounded to minor units.
    ///
    /// Currencies outside the selectable set are untaxed.
    ///
    /// # Errors
    ///
    /// - [`TaxError::NegativeAmount`]: `post_discount` is below zero.
    /// - [`TaxError::Overflow`]: the tax cannot be represented.
    pub fn compute_tax(
        &self,
        post_discount: &Money<'static, Currency>,
    ) -> Result<Money<'static, Currency>, TaxError> {
        let currency = post_discount.currency();

        let Some(code) = CurrencyCode::from_iso(currency) else {
            return Ok(Money::from_minor(0, currency));
        };

        let minor = Decimal::from_i64(post_discount.to_minor_units()).ok_or(TaxError::Overflow)?;
        let tax = round_minor(self.tax_minor_exact(minor, code)?)?;

        Ok(Money::from_minor(tax, currency))
    }

    /// Unrounded tax on a fractional minor-unit amount.
    pub(crate) fn tax_minor_exact(
        &self,
        post_discount_minor: Decimal,
        currency: CurrencyCode,
    ) -> Result<Decimal, TaxError> {
        if post_discount_minor < Decimal::ZERO {
            return Err(TaxError::NegativeAmount);
        }

        let Some(rate) = self.rates.get(&currency) else {
            return Ok(Decimal::ZERO);
        };

        Ok(percent_of_minor_exact(rate, post_discount_minor)?)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{self, NGN, USD};
    use testresult::TestResult;

    use super::*;
    use crate::discounts::percent_points;

    fn vat() -> Result<TaxTable, TaxError> {
        TaxTable::new([(CurrencyCode::Ngn, Percentage::from(Decimal::new(75, 3)))])
    }

    #[test]
    fn naira_is_charged_vat() -> TestResult {
        let tax = vat()?.compute_tax(&Money::from_minor(90_420_000, NGN))?;

        assert_eq!(tax, Money::from_minor(6_781_500, NGN));

        Ok(())
    }

    #[test]
    fn vat_rounds_to_nearest_kobo() -> TestResult {
        // 0.075 x 1001 kobo = 75.075 kobo
        let tax = vat()?.compute_tax(&Money::from_minor(1_001, NGN))?;

        assert_eq!(tax, Money::from_minor(75, NGN));

        Ok(())
    }

    #[test]
    fn other_currencies_are_untaxed() -> TestResult {
        let table = vat()?;

        for code in CurrencyCode::ALL {
            if code == CurrencyCode::Ngn {
                continue;
            }

            let tax = table.compute_tax(&Money::from_minor(54_800, code.iso()))?;

            assert_eq!(tax.to_minor_units(), 0);
            assert!(!table.is_taxed(code));
        }

        Ok(())
    }

    #[test]
    fn unsupported_iso_currency_is_untaxed() -> TestResult {
        let tax = vat()?.compute_tax(&Money::from_minor(10_000, iso::JPY))?;

        assert_eq!(tax.to_minor_units(), 0);

        Ok(())
    }

    #[test]
    fn rate_defaults_to_zero() -> TestResult {
        let table = vat()?;

        assert_eq!(percent_points(&table.rate(CurrencyCode::Usd)), Decimal::ZERO);
        assert_eq!(percent_points(&table.rate(CurrencyCode::Ngn)), Decimal::new(75, 1));

        Ok(())
    }

    #[test]
    fn rejects_negative_amounts() -> TestResult {
        let result = vat()?.compute_tax(&Money::from_minor(-100, USD));

        // USD carries no rate, so the sign check happens before lookup.
        assert_eq!(result, Err(TaxError::NegativeAmount));

        Ok(())
    }

    #[test]
    fn rejects_rates_above_one_hundred_percent() {
        let result = TaxTable::new([(CurrencyCode::Zar, Percentage::from(Decimal::TWO))]);

        assert_eq!(result, Err(TaxError::RateOutOfRange(CurrencyCode::Zar)));
    }
}
