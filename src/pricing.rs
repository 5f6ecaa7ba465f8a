//! Order totals
//!
//! Totals are computed in a fixed order: subtotal, discount, tax, total. Line item
//! prices are converted and rounded individually since they are displayed. Discount
//! and tax are shown rounded, but the total is taken from their unrounded values and
//! rounded once.

use jiff::Timestamp;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::PricingConfig,
    coupons::{AppliedCoupon, CouponError},
    currency::CurrencyCode,
    discounts::{DiscountError, round_minor},
    exchange::ExchangeError,
    items::OrderLineItem,
    tax::TaxError,
};

/// Errors that can occur while calculating order totals.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TotalsError {
    /// Wrapped conversion error.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// The applied coupon was rejected.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Wrapped tax error.
    #[error(transparent)]
    Tax(#[from] TaxError),

    /// Amounts could not be represented in minor units.
    #[error("order total overflowed")]
    Overflow,
}

impl From<DiscountError> for TotalsError {
    fn from(_error: DiscountError) -> Self {
        TotalsError::Overflow
    }
}

/// Derived totals for an order, all in the same display currency.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    /// Currency the totals are shown in; USD when the requested currency has no rate
    pub currency: CurrencyCode,

    /// Sum of converted line item prices
    pub subtotal: Money<'static, Currency>,

    /// Coupon discount, never above the subtotal
    pub discount: Money<'static, Currency>,

    /// Tax on the post-discount amount
    pub tax: Money<'static, Currency>,

    /// Amount payable
    pub total: Money<'static, Currency>,

    /// The coupon that produced `discount`, if any
    pub coupon: Option<AppliedCoupon>,

    /// A previously applied coupon that no longer holds and was left out of these totals
    pub rejected_coupon: Option<CouponError>,
}

impl OrderTotals {
    /// Whether nothing is payable.
    pub fn is_free(&self) -> bool {
        self.total.to_minor_units() == 0
    }
}

/// Sum line item prices in `currency`, converting and rounding each item.
///
/// Returns the effective currency alongside the subtotal.
///
/// # Errors
///
/// Returns a [`TotalsError`] if conversion fails or the sum overflows.
pub fn subtotal(
    config: &PricingConfig,
    items: &[OrderLineItem],
    currency: CurrencyCode,
) -> Result<(CurrencyCode, i64), TotalsError> {
    let (effective, _rate) = config.rates().effective(currency);

    let subtotal = items.iter().try_fold(0_i64, |acc, item| {
        let price = config.rates().convert(item.unit_price(), effective)?;

        acc.checked_add(price.to_minor_units())
            .ok_or(TotalsError::Overflow)
    })?;

    Ok((effective, subtotal))
}

/// Compute subtotal, discount, tax and total for an order.
///
/// # Errors
///
/// Returns a [`TotalsError`] if the coupon is rejected, conversion fails or an amount
/// overflows.
#[tracing::instrument(
    name = "pricing.compute_totals",
    skip(config, items),
    fields(items = items.len())
)]
pub fn compute_totals(
    config: &PricingConfig,
    items: &[OrderLineItem],
    coupon: Option<&str>,
    currency: CurrencyCode,
    now: Timestamp,
) -> Result<OrderTotals, TotalsError> {
    let (effective, subtotal_minor) = subtotal(config, items, currency)?;
    let display = effective.iso();
    let subtotal = Decimal::from_i64(subtotal_minor).ok_or(TotalsError::Overflow)?;

    let (applied, discount) = match coupon {
        Some(code) => {
            let (coupon, discount) = config.coupons().discount_minor_exact(
                code,
                subtotal,
                effective,
                config.rates(),
                now,
            )?;

            let applied = AppliedCoupon {
                code: coupon.code().to_string(),
                description: coupon.description().to_string(),
                discount: Money::from_minor(round_minor(discount)?, display),
            };

            (Some(applied), discount)
        }
        None => (None, Decimal::ZERO),
    };

    let taxable = subtotal - discount;
    let tax = config.tax().tax_minor_exact(taxable, effective)?;
    let total = round_minor(taxable.checked_add(tax).ok_or(TotalsError::Overflow)?)?;

    let totals = OrderTotals {
        currency: effective,
        subtotal: Money::from_minor(subtotal_minor, display),
        discount: Money::from_minor(round_minor(discount)?, display),
        tax: Money::from_minor(round_minor(tax)?, display),
        total: Money::from_minor(total, display),
        coupon: applied,
        rejected_coupon: None,
    };

    debug!(
        currency = %totals.currency,
        subtotal = %totals.subtotal,
        discount = %totals.discount,
        tax = %totals.tax,
        total = %totals.total,
        "computed order totals"
    );

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use decimal_percentage::Percentage;
    use rusty_money::iso::{NGN, USD};
    use testresult::TestResult;

    use super::*;
    use crate::tax::TaxTable;

    fn now() -> Result<Timestamp, jiff::Error> {
        "2026-03-01T12:00:00Z".parse()
    }

    fn items() -> Result<Vec<OrderLineItem>, crate::items::LineItemError> {
        Ok(vec![
            OrderLineItem::new("web", "Full-Stack Web", Money::from_minor(29_900, USD), "12 weeks")?,
            OrderLineItem::new("data", "Data Analysis", Money::from_minor(24_900, USD), "8 weeks")?,
        ])
    }

    #[test]
    fn empty_order_totals_zero() -> TestResult {
        let config = PricingConfig::builtin()?;
        let totals = compute_totals(&config, &[], None, CurrencyCode::Ngn, now()?)?;

        assert_eq!(totals.subtotal, Money::from_minor(0, NGN));
        assert_eq!(totals.total, Money::from_minor(0, NGN));
        assert!(totals.is_free());

        Ok(())
    }

    #[test]
    fn rounds_total_once() -> TestResult {
        let config = PricingConfig::builtin()?;
        let items = [OrderLineItem::new("x", "X", Money::from_minor(1, USD), "1 day")?];

        // 1650 kobo; 10% off leaves 1485; VAT 111.375 kobo
        let totals = compute_totals(&config, &items, Some("WELCOME10"), CurrencyCode::Ngn, now()?)?;

        assert_eq!(totals.subtotal.to_minor_units(), 1_650);
        assert_eq!(totals.discount.to_minor_units(), 165);
        assert_eq!(totals.tax.to_minor_units(), 111);
        assert_eq!(totals.total.to_minor_units(), 1_596);

        Ok(())
    }

    #[test]
    fn total_uses_unrounded_discount_and_tax() -> TestResult {
        let builtin = PricingConfig::builtin()?;
        let config = PricingConfig::new(
            "usd-vat",
            builtin.rates().clone(),
            builtin.coupons().clone(),
            TaxTable::new([(CurrencyCode::Usd, Percentage::from(Decimal::new(75, 3)))])?,
            builtin.tiers().clone(),
        );

        // 15c less 1.5c is 13.5c, taxed 1.0125c: 14.5125c payable
        let items = [OrderLineItem::new("x", "X", Money::from_minor(15, USD), "1 day")?];
        let totals = compute_totals(&config, &items, Some("WELCOME10"), CurrencyCode::Usd, now()?)?;

        assert_eq!(totals.discount.to_minor_units(), 2);
        assert_eq!(totals.tax.to_minor_units(), 1);
        assert_eq!(totals.total.to_minor_units(), 15);

        Ok(())
    }

    #[test]
    fn same_inputs_give_same_totals() -> TestResult {
        let config = PricingConfig::builtin()?;
        let items = items()?;

        for currency in CurrencyCode::ALL {
            for coupon in [None, Some("WELCOME10"), Some("STUDENT50")] {
                let first = compute_totals(&config, &items, coupon, currency, now()?)?;
                let second = compute_totals(&config, &items, coupon, currency, now()?)?;

                assert_eq!(first, second, "{currency} with {coupon:?}");
            }
        }

        Ok(())
    }

    #[test]
    fn rejected_coupon_fails_totals() -> TestResult {
        let config = PricingConfig::builtin()?;
        let result = compute_totals(&config, &items()?, Some("NOPE"), CurrencyCode::Usd, now()?);

        assert_eq!(
            result,
            Err(TotalsError::Coupon(CouponError::InvalidCoupon("NOPE".to_string())))
        );

        Ok(())
    }

    #[test]
    fn unsupported_currency_falls_back_to_usd() -> TestResult {
        let config = PricingConfig::builtin()?;
        let totals = compute_totals(&config, &items()?, None, CurrencyCode::Kes, now()?)?;

        assert_eq!(totals.currency, CurrencyCode::Usd);
        assert_eq!(totals.total, Money::from_minor(54_800, USD));

        Ok(())
    }

    #[test]
    fn subtotal_reports_effective_currency() -> TestResult {
        let config = PricingConfig::builtin()?;

        assert_eq!(subtotal(&config, &items()?, CurrencyCode::Gbp)?, (CurrencyCode::Gbp, 40_004));

        Ok(())
    }
}
