//! Pricing configuration
//!
//! Every pricing computation reads its tables from one [`PricingConfig`]: exchange
//! rates, coupons, tax and bulk tiers. Tables load from a versioned YAML file or from
//! the built-in defaults.

use std::{fs, path::Path};

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::{
    coupons::{Coupon, CouponError, CouponKind, CouponRegistry, FixedDenomination},
    currency::CurrencyCode,
    discounts::percent_from_points,
    exchange::{ExchangeError, ExchangeRates},
    items::LineItemError,
    tax::{TaxError, TaxTable},
    tiers::{BulkTier, BulkTiers, TierError},
};

pub mod catalog;
pub mod fixture;
pub mod parse;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("Failed to read pricing config: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid amount or rate
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid catalog price
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Catalog line item error
    #[error(transparent)]
    LineItem(#[from] LineItemError),

    /// Course id listed twice
    #[error("Duplicate course: {0}")]
    DuplicateCourse(String),

    /// Course id not in the catalog
    #[error("Unknown course: {0}")]
    UnknownCourse(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Invalid built-in timestamp
    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] jiff::Error),

    /// Exchange-rate table error
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Coupon registry error
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Tax table error
    #[error(transparent)]
    Tax(#[from] TaxError),

    /// Tier table error
    #[error(transparent)]
    Tier(#[from] TierError),
}

/// Revision of the built-in tables.
pub const BUILTIN_VERSION: &str = "2025.1";

/// The pricing tables shared by every storefront view.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    version: String,
    rates: ExchangeRates,
    coupons: CouponRegistry,
    tax: TaxTable,
    tiers: BulkTiers,
}

impl PricingConfig {
    /// Assemble a configuration from already validated tables.
    pub fn new(
        version: impl Into<String>,
        rates: ExchangeRates,
        coupons: CouponRegistry,
        tax: TaxTable,
        tiers: BulkTiers,
    ) -> Self {
        Self {
            version: version.into(),
            rates,
            coupons,
            tax,
            tiers,
        }
    }

    /// The tables the storefront ships with.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in tables themselves are invalid.
    pub fn builtin() -> Result<Self, ConfigError> {
        let rates = ExchangeRates::new([
            (CurrencyCode::Usd, Decimal::ONE),
            (CurrencyCode::Eur, Decimal::new(85, 2)),
            (CurrencyCode::Gbp, Decimal::new(73, 2)),
            (CurrencyCode::Ngn, Decimal::from(1_650)),
            (CurrencyCode::Zar, Decimal::new(185, 1)),
        ])?;

        let coupons = CouponRegistry::new(
            [
                Coupon::new(
                    "WELCOME10",
                    CouponKind::Percentage(percent_from_points(10)),
                    "10% off your first course",
                )?,
                Coupon::new(
                    "STUDENT50",
                    CouponKind::Fixed(Decimal::from(50)),
                    "50 off for verified students",
                )?,
                Coupon::new(
                    "SAVE20",
                    CouponKind::Percentage(percent_from_points(20)),
                    "20% off any order",
                )?
                .with_usage(1_000, 412),
                Coupon::new(
                    "FLASH30",
                    CouponKind::Percentage(percent_from_points(30)),
                    "30% off during the year-end flash sale",
                )?
                .with_expiry("2025-12-31T23:59:59Z".parse::<Timestamp>()?),
                Coupon::new(
                    "LAUNCH15",
                    CouponKind::Percentage(percent_from_points(15)),
                    "15% off during launch week",
                )?
                .with_usage(50, 50),
            ],
            FixedDenomination::DisplayCurrency,
        )?;

        let tax = TaxTable::new([(
            CurrencyCode::Ngn,
            Percentage::from(Decimal::new(75, 3)),
        )])?;

        let tiers = BulkTiers::new([
            BulkTier::new(1, 3, percent_from_points(0), "Individual"),
            BulkTier::new(4, 9, percent_from_points(15), "Team"),
            BulkTier::new(10, 49, percent_from_points(25), "Medium"),
            BulkTier::new(50, 99, percent_from_points(40), "Enterprise"),
        ])?;

        Ok(Self::new(BUILTIN_VERSION, rates, coupons, tax, tiers))
    }

    /// Parse a configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or any table fails validation.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let fixture: fixture::PricingFixture = serde_norway::from_str(contents)?;

        let rates = fixture
            .rates
            .iter()
            .map(|(code, rate)| Ok((*code, parse::parse_decimal(rate)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let tax = fixture
            .tax
            .iter()
            .map(|(code, rate)| Ok((*code, parse::parse_percentage(rate)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let coupons = fixture
            .coupons
            .into_iter()
            .map(|(code, coupon)| coupon.try_into_coupon(&code))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let tiers = fixture
            .tiers
            .into_iter()
            .map(BulkTier::try_from)
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self::new(
            fixture.version,
            ExchangeRates::new(rates)?,
            CouponRegistry::new(coupons, fixture.fixed_amounts)?,
            TaxTable::new(tax)?,
            BulkTiers::new(tiers)?,
        ))
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&contents)?;

        info!(
            path = %path.display(),
            version = %config.version,
            coupons = config.coupons.len(),
            "loaded pricing config"
        );

        Ok(config)
    }

    /// Load `path` when given, otherwise use the built-in tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// Revision of the tables
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Exchange-rate table
    pub fn rates(&self) -> &ExchangeRates {
        &self.rates
    }

    /// Coupon registry
    pub fn coupons(&self) -> &CouponRegistry {
        &self.coupons
    }

    /// Tax table
    pub fn tax(&self) -> &TaxTable {
        &self.tax
    }

    /// Bulk tier table
    pub fn tiers(&self) -> &BulkTiers {
        &self.tiers
    }
}
