//! Coursecart
//!
//! Coursecart is the pricing core of an online course marketplace: currency conversion,
//! coupons, tax, bulk seat tiers and order totals, plus the checkout session that ties
//! them together.

pub mod checkout;
pub mod config;
pub mod coupons;
pub mod currency;
pub mod discounts;
pub mod exchange;
pub mod items;
pub mod logging;
pub mod payments;
pub mod preferences;
pub mod prelude;
pub mod pricing;
pub mod receipt;
pub mod tax;
pub mod tiers;
