//! Currencies

use std::{fmt, str::FromStr};

use rusty_money::iso::{self, Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading a currency code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurrencyError {
    /// The code is not one of the currencies shoppers can select.
    #[error("unsupported currency code: {0}")]
    InvalidCurrency(String),
}

/// Display currencies a shopper can select.
///
/// Catalog prices are always authored in [`CurrencyCode::Usd`]; every other code is a
/// conversion target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    /// United States dollar
    Usd,

    /// Euro
    Eur,

    /// Pound sterling
    Gbp,

    /// Nigerian naira
    Ngn,

    /// South African rand
    Zar,

    /// Kenyan shilling
    Kes,
}

impl CurrencyCode {
    /// Every selectable currency, in selector order.
    pub const ALL: [CurrencyCode; 6] = [
        CurrencyCode::Usd,
        CurrencyCode::Eur,
        CurrencyCode::Gbp,
        CurrencyCode::Ngn,
        CurrencyCode::Zar,
        CurrencyCode::Kes,
    ];

    /// ISO 4217 alphabetic code.
    pub const fn code(self) -> &'static str {
        match self {
            CurrencyCode::Usd => "USD",
            CurrencyCode::Eur => "EUR",
            CurrencyCode::Gbp => "GBP",
            CurrencyCode::Ngn => "NGN",
            CurrencyCode::Zar => "ZAR",
            CurrencyCode::Kes => "KES",
        }
    }

    /// Symbol shown in front of amounts.
    pub const fn symbol(self) -> &'static str {
        match self {
            CurrencyCode::Usd => "$",
            CurrencyCode::Eur => "€",
            CurrencyCode::Gbp => "£",
            CurrencyCode::Ngn => "₦",
            CurrencyCode::Zar => "R",
            CurrencyCode::Kes => "KSh",
        }
    }

    /// The ISO currency definition backing [`rusty_money::Money`] values.
    pub fn iso(self) -> &'static Currency {
        match self {
            CurrencyCode::Usd => iso::USD,
            CurrencyCode::Eur => iso::EUR,
            CurrencyCode::Gbp => iso::GBP,
            CurrencyCode::Ngn => iso::NGN,
            CurrencyCode::Zar => iso::ZAR,
            CurrencyCode::Kes => iso::KES,
        }
    }

    /// Map an ISO currency back to a selectable code, if it is one.
    pub fn from_iso(currency: &Currency) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.code() == currency.iso_alpha_code)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        Self::ALL
            .into_iter()
            .find(|code| code.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CurrencyError::InvalidCurrency(trimmed.to_string()))
    }
}
