//! YAML representation of the pricing tables

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    config::{
        ConfigError,
        parse::{parse_decimal, parse_percentage},
    },
    coupons::{Coupon, CouponKind, FixedDenomination},
    currency::CurrencyCode,
    tiers::BulkTier,
};

/// Top-level pricing file
#[derive(Debug, Deserialize)]
pub struct PricingFixture {
    /// Revision of the tables, e.g. "2025.1"
    pub version: String,

    /// Currency -> rate against USD (e.g., "1650")
    #[serde(default)]
    pub rates: FxHashMap<CurrencyCode, String>,

    /// Currency -> tax rate (e.g., "7.5%")
    #[serde(default)]
    pub tax: FxHashMap<CurrencyCode, String>,

    /// Currency fixed coupon amounts are written in
    #[serde(default)]
    pub fixed_amounts: FixedDenomination,

    /// Coupon code -> coupon
    #[serde(default)]
    pub coupons: FxHashMap<String, CouponFixture>,

    /// Bulk seat tiers
    pub tiers: Vec<TierFixture>,
}

/// Coupon discount type in YAML
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    /// `value` is a percentage such as "10%"
    Percentage,

    /// `value` is a flat amount such as "50"
    Fixed,
}

/// Coupon Fixture
#[derive(Debug, Deserialize)]
pub struct CouponFixture {
    /// Discount type
    #[serde(rename = "type")]
    pub kind: CouponType,

    /// Percentage or amount, depending on `kind`
    pub value: String,

    /// Shopper-facing description
    pub description: String,

    /// RFC 3339 expiry instant
    #[serde(default)]
    pub expires_at: Option<Timestamp>,

    /// Maximum number of redemptions
    #[serde(default)]
    pub usage_limit: Option<u32>,

    /// Redemptions so far
    #[serde(default)]
    pub used_count: u32,
}

impl CouponFixture {
    /// Convert into a validated [`Coupon`] registered under `code`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be parsed or the coupon is invalid.
    pub fn try_into_coupon(self, code: &str) -> Result<Coupon, ConfigError> {
        let kind = match self.kind {
            CouponType::Percentage => CouponKind::Percentage(parse_percentage(&self.value)?),
            CouponType::Fixed => CouponKind::Fixed(parse_decimal(&self.value)?),
        };

        let mut coupon = Coupon::new(code, kind, self.description)?;

        if let Some(expires_at) = self.expires_at {
            coupon = coupon.with_expiry(expires_at);
        }

        if let Some(limit) = self.usage_limit {
            coupon = coupon.with_usage(limit, self.used_count);
        }

        Ok(coupon)
    }
}

/// Tier Fixture
#[derive(Debug, Deserialize)]
pub struct TierFixture {
    /// Tier name
    pub label: String,

    /// Lowest staff count
    pub min_seats: u32,

    /// Highest staff count
    pub max_seats: u32,

    /// Discount (e.g., "25%")
    pub discount: String,
}

impl TryFrom<TierFixture> for BulkTier {
    type Error = ConfigError;

    fn try_from(fixture: TierFixture) -> Result<Self, Self::Error> {
        Ok(BulkTier::new(
            fixture.min_seats,
            fixture.max_seats,
            parse_percentage(&fixture.discount)?,
            fixture.label,
        ))
    }
}
