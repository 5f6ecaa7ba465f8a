//! Coursecart prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    checkout::{CheckoutError, CheckoutSession},
    config::{ConfigError, PricingConfig, catalog::CourseCatalog},
    coupons::{AppliedCoupon, Coupon, CouponError, CouponKind, CouponRegistry, FixedDenomination},
    currency::{CurrencyCode, CurrencyError},
    exchange::{ExchangeError, ExchangeRates, format_money},
    items::{LineItemError, OrderLineItem},
    payments::{
        PaymentError, PaymentGateway, PaymentMethod, PaymentReceipt, PaymentRequest,
        SimulatedGateway,
    },
    preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceError, PreferenceStore},
    pricing::{OrderTotals, TotalsError, compute_totals},
    receipt::{SummaryError, write_order_summary},
    tax::{TaxError, TaxTable},
    tiers::{BulkTier, BulkTiers, SeatQuote, TierError},
};
