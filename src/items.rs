//! Order line items

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use thiserror::Error;

use crate::{
    currency::CurrencyCode,
    exchange::{ExchangeError, ExchangeRates},
};

/// Errors raised while building a line item.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineItemError {
    /// Catalog prices must be authored in USD.
    #[error("catalog price for `{id}` must be in USD, got {currency}")]
    NotUsd {
        /// Line item id
        id: String,
        /// Currency the price was given in
        currency: String,
    },

    /// Catalog prices cannot be negative.
    #[error("catalog price for `{0}` must not be negative")]
    NegativePrice(String),
}

/// A course or bundle in an order. Each line is a single unit; there is no quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineItem {
    id: String,
    title: String,
    unit_price: Money<'static, Currency>,
    original_price: Option<Money<'static, Currency>>,
    duration_label: String,
}

impl OrderLineItem {
    /// Create a line item priced in USD.
    ///
    /// # Errors
    ///
    /// Returns a [`LineItemError`] if the price is not a non-negative USD amount.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        unit_price: Money<'static, Currency>,
        duration_label: impl Into<String>,
    ) -> Result<Self, LineItemError> {
        let id = id.into();

        check_catalog_price(&id, &unit_price)?;

        Ok(Self {
            id,
            title: title.into(),
            unit_price,
            original_price: None,
            duration_label: duration_label.into(),
        })
    }

    /// Attach the pre-markdown price shown struck through on listings.
    ///
    /// # Errors
    ///
    /// Returns a [`LineItemError`] if the price is not a non-negative USD amount.
    pub fn with_original_price(
        mut self,
        original_price: Money<'static, Currency>,
    ) -> Result<Self, LineItemError> {
        check_catalog_price(&self.id, &original_price)?;

        self.original_price = Some(original_price);

        Ok(self)
    }

    /// Line item id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Course or bundle title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Catalog price in USD
    pub fn unit_price(&self) -> &Money<'static, Currency> {
        &self.unit_price
    }

    /// Pre-markdown catalog price in USD, if any
    pub fn original_price(&self) -> Option<&Money<'static, Currency>> {
        self.original_price.as_ref()
    }

    /// Human readable duration, e.g. "6 weeks"
    pub fn duration_label(&self) -> &str {
        &self.duration_label
    }

    /// Price in the display currency.
    ///
    /// # Errors
    ///
    /// Returns an [`ExchangeError`] if conversion fails.
    pub fn display_price(
        &self,
        rates: &ExchangeRates,
        currency: CurrencyCode,
    ) -> Result<Money<'static, Currency>, ExchangeError> {
        rates.convert(&self.unit_price, currency)
    }

    /// Original price in the display currency, if any.
    ///
    /// # Errors
    ///
    /// Returns an [`ExchangeError`] if conversion fails.
    pub fn display_original_price(
        &self,
        rates: &ExchangeRates,
        currency: CurrencyCode,
    ) -> Result<Option<Money<'static, Currency>>, ExchangeError> {
        self.original_price
            .as_ref()
            .map(|price| rates.convert(price, currency))
            .transpose()
    }

    /// Saving against the original price, for "x% off" badges.
    ///
    /// Zero when there is no original price or it is not above the current price.
    pub fn savings_percent(&self) -> Percentage {
        let Some(original) = self.original_price else {
            return Percentage::from(Decimal::ZERO);
        };

        let original_minor = original.to_minor_units();
        let price_minor = self.unit_price.to_minor_units();

        if original_minor <= price_minor {
            return Percentage::from(Decimal::ZERO);
        }

        let saved = Decimal::from_i64(original_minor - price_minor).unwrap_or(Decimal::ZERO);
        let original = Decimal::from_i64(original_minor).unwrap_or(Decimal::ONE);

        Percentage::from(saved / original)
    }
}

fn check_catalog_price(id: &str, price: &Money<'static, Currency>) -> Result<(), LineItemError> {
    if price.currency() != iso::USD {
        return Err(LineItemError::NotUsd {
            id: id.to_string(),
            currency: price.currency().iso_alpha_code.to_string(),
        });
    }

    if price.to_minor_units() < 0 {
        return Err(LineItemError::NegativePrice(id.to_string()));
    }

    Ok(())
}
