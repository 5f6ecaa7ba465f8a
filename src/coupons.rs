//! Coupons
//!
//! A [`CouponRegistry`] holds every promotional code the storefront accepts. Codes are
//! matched exactly, ignoring case. Applying a coupon never mutates the registry: usage
//! counts are read to decide validity but nothing is redeemed here.

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    currency::CurrencyCode,
    discounts::{DiscountError, is_unit_percentage, percent_of_minor_exact, round_minor},
    exchange::{ExchangeError, ExchangeRates, minor_unit_scale},
};

/// Errors raised when building or applying coupons.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponError {
    /// No coupon with this code exists.
    #[error("coupon code `{0}` is not valid")]
    InvalidCoupon(String),

    /// The coupon was valid until `expired_at`.
    #[error("coupon `{code}` expired at {expired_at}")]
    ExpiredCoupon {
        /// Normalised coupon code
        code: String,
        /// Expiry instant
        expired_at: Timestamp,
    },

    /// The coupon has been redeemed as many times as allowed.
    #[error("coupon `{code}` has reached its usage limit of {limit}")]
    UsageLimitExceeded {
        /// Normalised coupon code
        code: String,
        /// Maximum number of redemptions
        limit: u32,
    },

    /// Percentage coupons must sit within `0%..=100%`.
    #[error("percentage for coupon `{0}` must be between 0% and 100%")]
    PercentOutOfRange(String),

    /// Fixed coupons cannot add to the price.
    #[error("fixed amount for coupon `{0}` must not be negative")]
    NegativeAmount(String),

    /// Codes must contain at least one non-whitespace character.
    #[error("coupon code must not be empty")]
    EmptyCode,

    /// Two coupons normalise to the same code.
    #[error("duplicate coupon code `{0}`")]
    DuplicateCoupon(String),

    /// Subtotals must be in a selectable display currency.
    #[error("cannot discount an amount in unsupported currency {0}")]
    UnsupportedCurrency(String),

    /// The discount could not be represented in minor units.
    #[error("discount amount overflowed")]
    Overflow,

    /// Wrapped conversion error for USD-denominated fixed coupons.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl CouponError {
    /// Whether the coupon itself cannot be used, as opposed to a pricing failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CouponError::InvalidCoupon(_)
                | CouponError::ExpiredCoupon { .. }
                | CouponError::UsageLimitExceeded { .. }
        )
    }
}

impl From<DiscountError> for CouponError {
    fn from(_error: DiscountError) -> Self {
        CouponError::Overflow
    }
}

/// How a coupon reduces the subtotal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CouponKind {
    /// A share of the subtotal, e.g. "10% off".
    Percentage(Percentage),

    /// A flat amount in major units, e.g. "50 off".
    Fixed(Decimal),
}

/// The currency a fixed coupon amount is expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedDenomination {
    /// The amount is taken as-is in the shopper's display currency.
    #[default]
    DisplayCurrency,

    /// The amount is authored in USD and converted like a catalog price.
    Usd,
}

/// A promotional code and its discount rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon {
    code: String,
    kind: CouponKind,
    description: String,
    expires_at: Option<Timestamp>,
    usage_limit: Option<u32>,
    used_count: u32,
}

impl Coupon {
    /// Create a coupon without expiry or usage limit. The code is stored upper-case.
    ///
    /// # Errors
    ///
    /// - [`CouponError::EmptyCode`]: the code is blank.
    /// - [`CouponError::PercentOutOfRange`]: a percentage outside `0%..=100%`.
    /// - [`CouponError::NegativeAmount`]: a negative fixed amount.
    pub fn new(
        code: &str,
        kind: CouponKind,
        description: impl Into<String>,
    ) -> Result<Self, CouponError> {
        let code = normalise_code(code);

        if code.is_empty() {
            return Err(CouponError::EmptyCode);
        }

        match kind {
            CouponKind::Percentage(percent) if !is_unit_percentage(&percent) => {
                return Err(CouponError::PercentOutOfRange(code));
            }
            CouponKind::Fixed(amount) if amount < Decimal::ZERO => {
                return Err(CouponError::NegativeAmount(code));
            }
            CouponKind::Percentage(_) | CouponKind::Fixed(_) => {}
        }

        Ok(Self {
            code,
            kind,
            description: description.into(),
            expires_at: None,
            usage_limit: None,
            used_count: 0,
        })
    }

    /// Set the instant after which the coupon is no longer accepted.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the redemption limit and how many redemptions have happened.
    #[must_use]
    pub fn with_usage(mut self, usage_limit: u32, used_count: u32) -> Self {
        self.usage_limit = Some(usage_limit);
        self.used_count = used_count;
        self
    }

    /// Upper-case coupon code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Discount rule
    pub fn kind(&self) -> CouponKind {
        self.kind
    }

    /// Shopper-facing description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Expiry instant, if any
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    /// Redemption limit, if any
    pub fn usage_limit(&self) -> Option<u32> {
        self.usage_limit
    }

    /// Redemptions so far
    pub fn used_count(&self) -> u32 {
        self.used_count
    }

    /// Check expiry and usage limit at `now`.
    ///
    /// # Errors
    ///
    /// - [`CouponError::ExpiredCoupon`]: `now` is after the expiry instant.
    /// - [`CouponError::UsageLimitExceeded`]: the usage limit has been reached.
    pub fn check_valid(&self, now: Timestamp) -> Result<(), CouponError> {
        if let Some(expired_at) = self.expires_at
            && now > expired_at
        {
            return Err(CouponError::ExpiredCoupon {
                code: self.code.clone(),
                expired_at,
            });
        }

        if let Some(limit) = self.usage_limit
            && self.used_count >= limit
        {
            return Err(CouponError::UsageLimitExceeded {
                code: self.code.clone(),
                limit,
            });
        }

        Ok(())
    }

    /// Unrounded discount in minor units of `currency`, clamped to `[0, subtotal_minor]`.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] if the amount overflows or a USD fixed amount cannot be
    /// converted.
    pub(crate) fn discount_minor_exact(
        &self,
        subtotal_minor: Decimal,
        currency: CurrencyCode,
        denomination: FixedDenomination,
        rates: &ExchangeRates,
    ) -> Result<Decimal, CouponError> {
        let raw = match self.kind {
            CouponKind::Percentage(percent) => percent_of_minor_exact(&percent, subtotal_minor)?,
            CouponKind::Fixed(amount) => match denomination {
                FixedDenomination::DisplayCurrency => minor_unit_scale(currency.iso())
                    .and_then(|scale| amount.checked_mul(scale))
                    .ok_or(CouponError::Overflow)?,
                FixedDenomination::Usd => rates.convert_major_exact(amount, currency)?,
            },
        };

        Ok(raw.clamp(Decimal::ZERO, subtotal_minor.max(Decimal::ZERO)))
    }
}

/// A coupon accepted against a subtotal.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCoupon {
    /// Upper-case coupon code
    pub code: String,

    /// Shopper-facing description
    pub description: String,

    /// Discount in the subtotal's currency, rounded to minor units
    pub discount: Money<'static, Currency>,
}

/// The set of coupons a storefront accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouponRegistry {
    coupons: FxHashMap<String, Coupon>,
    fixed_amounts: FixedDenomination,
}

impl CouponRegistry {
    /// Build a registry.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::DuplicateCoupon`] if two coupons share a code.
    pub fn new(
        coupons: impl IntoIterator<Item = Coupon>,
        fixed_amounts: FixedDenomination,
    ) -> Result<Self, CouponError> {
        let mut map = FxHashMap::default();

        for coupon in coupons {
            if map.contains_key(coupon.code()) {
                return Err(CouponError::DuplicateCoupon(coupon.code));
            }

            map.insert(coupon.code.clone(), coupon);
        }

        Ok(Self {
            coupons: map,
            fixed_amounts,
        })
    }

    /// Currency fixed amounts are expressed in.
    pub fn fixed_amounts(&self) -> FixedDenomination {
        self.fixed_amounts
    }

    /// Exact, case-insensitive lookup.
    pub fn get(&self, code: &str) -> Option<&Coupon> {
        self.coupons.get(&normalise_code(code))
    }

    /// Number of registered coupons
    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    /// Whether the registry has no coupons
    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }

    /// Iterate coupons in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Coupon> {
        let mut coupons: Vec<&Coupon> = self.coupons.values().collect();
        coupons.sort_by(|a, b| a.code.cmp(&b.code));
        coupons.into_iter()
    }

    /// Look up a coupon and check it is usable at `now`.
    ///
    /// # Errors
    ///
    /// - [`CouponError::InvalidCoupon`]: no coupon has this code.
    /// - [`CouponError::ExpiredCoupon`]: the coupon has expired.
    /// - [`CouponError::UsageLimitExceeded`]: the coupon is used up.
    pub fn validate(&self, code: &str, now: Timestamp) -> Result<&Coupon, CouponError> {
        let coupon = self
            .get(code)
            .ok_or_else(|| CouponError::InvalidCoupon(normalise_code(code)))?;

        coupon.check_valid(now)?;

        Ok(coupon)
    }

    /// Unrounded, clamped discount for `code` against a minor-unit subtotal.
    pub(crate) fn discount_minor_exact(
        &self,
        code: &str,
        subtotal_minor: Decimal,
        currency: CurrencyCode,
        rates: &ExchangeRates,
        now: Timestamp,
    ) -> Result<(&Coupon, Decimal), CouponError> {
        let coupon = self.validate(code, now)?;
        let discount =
            coupon.discount_minor_exact(subtotal_minor, currency, self.fixed_amounts, rates)?;

        Ok((coupon, discount))
    }

    /// Apply `code` to `subtotal`.
    ///
    /// The discount is in the subtotal's currency and never exceeds the subtotal.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] if the coupon is unknown, expired or used up, or if the
    /// subtotal is not in a selectable currency.
    #[tracing::instrument(
        name = "coupons.apply",
        skip(self, subtotal, rates),
        fields(subtotal = %subtotal)
    )]
    pub fn apply(
        &self,
        code: &str,
        subtotal: &Money<'static, Currency>,
        rates: &ExchangeRates,
        now: Timestamp,
    ) -> Result<AppliedCoupon, CouponError> {
        let currency = CurrencyCode::from_iso(subtotal.currency()).ok_or_else(|| {
            CouponError::UnsupportedCurrency(subtotal.currency().iso_alpha_code.to_string())
        })?;

        let subtotal_minor =
            Decimal::from_i64(subtotal.to_minor_units()).ok_or(CouponError::Overflow)?;

        let result = self.discount_minor_exact(code, subtotal_minor, currency, rates, now);

        let (coupon, discount) = match result {
            Ok(found) => found,
            Err(error) => {
                debug!(%error, "coupon rejected");
                return Err(error);
            }
        };

        let applied = AppliedCoupon {
            code: coupon.code.clone(),
            description: coupon.description.clone(),
            discount: Money::from_minor(round_minor(discount)?, currency.iso()),
        };

        debug!(code = %applied.code, discount = %applied.discount, "coupon applied");

        Ok(applied)
    }
}

/// Upper-case a code and strip surrounding whitespace.
pub fn normalise_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{NGN, USD};
    use testresult::TestResult;

    use super::*;

    fn now() -> Result<Timestamp, jiff::Error> {
        "2026-03-01T12:00:00Z".parse()
    }

    fn rates() -> Result<ExchangeRates, ExchangeError> {
        ExchangeRates::new([(CurrencyCode::Ngn, Decimal::from(1_650))])
    }

    fn registry(
        denomination: FixedDenomination,
    ) -> Result<CouponRegistry, Box<dyn std::error::Error>> {
        let coupons = [
            Coupon::new(
                "welcome10",
                CouponKind::Percentage(Percentage::from(Decimal::new(10, 2))),
                "10% off your first course",
            )?,
            Coupon::new(
                "STUDENT50",
                CouponKind::Fixed(Decimal::from(50)),
                "50 off for students",
            )?,
            Coupon::new(
                "FLASH30",
                CouponKind::Percentage(Percentage::from(Decimal::new(30, 2))),
                "Flash sale",
            )?
            .with_expiry("2026-01-31T23:59:59Z".parse()?),
            Coupon::new(
                "LAUNCH15",
                CouponKind::Percentage(Percentage::from(Decimal::new(15, 2))),
                "Launch week",
            )?
            .with_usage(50, 50),
        ];

        Ok(CouponRegistry::new(coupons, denomination)?)
    }

    #[test]
    fn percentage_coupon_discounts_subtotal() -> TestResult {
        let registry = registry(FixedDenomination::DisplayCurrency)?;
        let subtotal = Money::from_minor(54_800, USD);
        let applied = registry.apply("WELCOME10", &subtotal, &rates()?, now()?)?;

        assert_eq!(applied.code, "WELCOME10");
        assert_eq!(applied.discount, Money::from_minor(5_480, USD));

        Ok(())
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() -> TestResult {
        let registry = registry(FixedDenomination::DisplayCurrency)?;

        assert!(registry.get(" welcome10 ").is_some());
        assert!(registry.get("WELCOME").is_none());

        Ok(())
    }

    #[test]
    fn unknown_code_is_invalid() -> TestResult {
        let registry = registry(FixedDenomination::DisplayCurrency)?;
        let result = registry.apply("bogus", &Money::from_minor(100, USD), &rates()?, now()?);

        assert_eq!(result, Err(CouponError::InvalidCoupon("BOGUS".to_string())));

        Ok(())
    }

    #[test]
    fn expired_coupon_is_rejected() -> TestResult {
        let registry = registry(FixedDenomination::DisplayCurrency)?;
        let result = registry.apply("FLASH30", &Money::from_minor(100, USD), &rates()?, now()?);

        assert!(matches!(
            result,
            Err(CouponError::ExpiredCoupon { code, .. }) if code == "FLASH30"
        ));

        Ok(())
    }

    #[test]
    fn coupon_is_valid_at_its_expiry_instant() -> TestResult {
        let expiry: Timestamp = "2026-01-31T23:59:59Z".parse()?;
        let coupon =
            Coupon::new("EDGE", CouponKind::Fixed(Decimal::ONE), "edge")?.with_expiry(expiry);

        assert_eq!(coupon.check_valid(expiry), Ok(()));

        Ok(())
    }

    #[test]
    fn used_up_coupon_is_rejected() -> TestResult {
        let registry = registry(FixedDenomination::DisplayCurrency)?;
        let result = registry.apply("LAUNCH15", &Money::from_minor(100, USD), &rates()?, now()?);

        assert_eq!(
            result,
            Err(CouponError::UsageLimitExceeded {
                code: "LAUNCH15".to_string(),
                limit: 50,
            })
        );

        Ok(())
    }

    #[test]
    fn fixed_coupon_is_clamped_to_subtotal() -> TestResult {
        let registry = registry(FixedDenomination::DisplayCurrency)?;
        let subtotal = Money::from_minor(4_000, USD);
        let applied = registry.apply("STUDENT50", &subtotal, &rates()?, now()?)?;

        assert_eq!(applied.discount, Money::from_minor(4_000, USD));

        Ok(())
    }

    #[test]
    fn fixed_coupon_in_display_currency_uses_local_units() -> TestResult {
        let registry = registry(FixedDenomination::DisplayCurrency)?;
        let subtotal = Money::from_minor(90_420_000, NGN);
        let applied = registry.apply("STUDENT50", &subtotal, &rates()?, now()?)?;

        assert_eq!(applied.discount, Money::from_minor(5_000, NGN));

        Ok(())
    }

    #[test]
    fn fixed_coupon_in_usd_is_converted() -> TestResult {
        let registry = registry(FixedDenomination::Usd)?;
        let subtotal = Money::from_minor(90_420_000, NGN);
        let applied = registry.apply("STUDENT50", &subtotal, &rates()?, now()?)?;

        assert_eq!(applied.discount, Money::from_minor(8_250_000, NGN));

        Ok(())
    }

    #[test]
    fn discount_never_exceeds_subtotal() -> TestResult {
        let registry = registry(FixedDenomination::DisplayCurrency)?;

        for subtotal in [0, 1, 999, 4_999, 5_000, 54_800] {
            for code in ["WELCOME10", "STUDENT50"] {
                let applied =
                    registry.apply(code, &Money::from_minor(subtotal, USD), &rates()?, now()?)?;

                assert!(applied.discount.to_minor_units() <= subtotal);
                assert!(applied.discount.to_minor_units() >= 0);
            }
        }

        Ok(())
    }

    #[test]
    fn rejects_invalid_coupons() {
        assert_eq!(
            Coupon::new(
                "BIG",
                CouponKind::Percentage(Percentage::from(Decimal::new(150, 2))),
                "too much"
            ),
            Err(CouponError::PercentOutOfRange("BIG".to_string()))
        );
        assert_eq!(
            Coupon::new("NEG", CouponKind::Fixed(Decimal::NEGATIVE_ONE), "negative"),
            Err(CouponError::NegativeAmount("NEG".to_string()))
        );
        assert_eq!(
            Coupon::new("   ", CouponKind::Fixed(Decimal::ONE), "blank"),
            Err(CouponError::EmptyCode)
        );
    }

    #[test]
    fn rejects_duplicate_codes() -> TestResult {
        let first = Coupon::new("SAME", CouponKind::Fixed(Decimal::ONE), "one")?;
        let second = Coupon::new("same", CouponKind::Fixed(Decimal::TWO), "two")?;
        let result = CouponRegistry::new([first, second], FixedDenomination::DisplayCurrency);

        assert_eq!(result, Err(CouponError::DuplicateCoupon("SAME".to_string())));

        Ok(())
    }
}
