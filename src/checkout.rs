//! Checkout session
//!
//! Holds the shopper's current order: line items, an optional coupon and the display
//! currency. Totals are always recomputed from these inputs, so changing the currency
//! or coupon can never leave stale amounts behind.

use jiff::Timestamp;
use rusty_money::Money;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::PricingConfig,
    coupons::{AppliedCoupon, CouponError},
    currency::CurrencyCode,
    items::OrderLineItem,
    payments::{PaymentError, PaymentGateway, PaymentMethod, PaymentReceipt, PaymentRequest},
    preferences::{PreferenceError, PreferenceStore},
    pricing::{OrderTotals, TotalsError, compute_totals, subtotal},
};

/// Errors raised while editing or paying for an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The item is already in the order.
    #[error("`{0}` is already in the order")]
    DuplicateItem(String),

    /// No item with this id is in the order.
    #[error("`{0}` is not in the order")]
    UnknownItem(String),

    /// Paying for an order with no items.
    #[error("order is empty")]
    EmptyOrder,

    /// The coupon was rejected.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Totals could not be computed.
    #[error(transparent)]
    Totals(#[from] TotalsError),

    /// Preference store failure
    #[error(transparent)]
    Preferences(#[from] PreferenceError),

    /// The gateway refused the payment.
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// An order being assembled by a shopper.
#[derive(Debug, Clone)]
pub struct CheckoutSession<'c> {
    config: &'c PricingConfig,
    items: SmallVec<[OrderLineItem; 4]>,
    coupon: Option<String>,
    currency: CurrencyCode,
}

impl<'c> CheckoutSession<'c> {
    /// Start an empty USD order.
    pub fn new(config: &'c PricingConfig) -> Self {
        Self {
            config,
            items: SmallVec::new(),
            coupon: None,
            currency: CurrencyCode::Usd,
        }
    }

    /// Start an empty order in the shopper's saved currency, or USD if none was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn with_preferences(
        config: &'c PricingConfig,
        store: &dyn PreferenceStore,
    ) -> Result<Self, CheckoutError> {
        let mut session = Self::new(config);

        if let Some(currency) = store.load_currency()? {
            session.currency = currency;
        }

        Ok(session)
    }

    /// Pricing tables this order is priced with
    pub fn config(&self) -> &'c PricingConfig {
        self.config
    }

    /// Line items in the order they were added
    pub fn items(&self) -> &[OrderLineItem] {
        &self.items
    }

    /// Code of the applied coupon, if any
    pub fn coupon(&self) -> Option<&str> {
        self.coupon.as_deref()
    }

    /// Selected display currency
    pub fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Add a line item.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::DuplicateItem`] if an item with the same id is present.
    pub fn add_item(&mut self, item: OrderLineItem) -> Result<(), CheckoutError> {
        if self.items.iter().any(|existing| existing.id() == item.id()) {
            return Err(CheckoutError::DuplicateItem(item.id().to_string()));
        }

        debug!(id = item.id(), "added line item");

        self.items.push(item);

        Ok(())
    }

    /// Remove the line item with `id` and return it.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnknownItem`] if no such item is present.
    pub fn remove_item(&mut self, id: &str) -> Result<OrderLineItem, CheckoutError> {
        let idx = self
            .items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| CheckoutError::UnknownItem(id.to_string()))?;

        Ok(self.items.remove(idx))
    }

    /// Apply `code`, replacing any coupon already applied.
    ///
    /// The coupon is checked against the current subtotal. On failure the previously
    /// applied coupon, if any, stays in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the coupon is unknown, expired or used up.
    pub fn apply_coupon(
        &mut self,
        code: &str,
        now: Timestamp,
    ) -> Result<AppliedCoupon, CheckoutError> {
        let (currency, subtotal) = subtotal(self.config, &self.items, self.currency)?;
        let subtotal = Money::from_minor(subtotal, currency.iso());

        let applied = self
            .config
            .coupons()
            .apply(code, &subtotal, self.config.rates(), now)?;

        self.coupon = Some(applied.code.clone());

        Ok(applied)
    }

    /// Remove the applied coupon, returning its code.
    pub fn clear_coupon(&mut self) -> Option<String> {
        self.coupon.take()
    }

    /// Change the display currency.
    pub fn set_currency(&mut self, currency: CurrencyCode) {
        self.currency = currency;
    }

    /// Change the display currency and remember it for later sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written. The session currency is changed
    /// either way.
    pub fn save_currency(
        &mut self,
        currency: CurrencyCode,
        store: &dyn PreferenceStore,
    ) -> Result<(), CheckoutError> {
        self.set_currency(currency);

        store.save_currency(currency)?;

        Ok(())
    }

    /// Current totals.
    ///
    /// If the applied coupon has stopped being usable since it was applied (expired,
    /// used up or withdrawn), it is dropped from the session and the order is priced
    /// without it. The rejection is reported on [`OrderTotals::rejected_coupon`].
    ///
    /// # Errors
    ///
    /// Returns an error if an amount cannot be computed.
    pub fn totals(&mut self, now: Timestamp) -> Result<OrderTotals, CheckoutError> {
        let priced = compute_totals(
            self.config,
            &self.items,
            self.coupon.as_deref(),
            self.currency,
            now,
        );

        match priced {
            Err(TotalsError::Coupon(error)) if error.is_unavailable() => {
                let dropped = self.coupon.take();

                warn!(
                    code = dropped.as_deref(),
                    %error,
                    "dropped coupon that no longer applies"
                );

                let mut totals =
                    compute_totals(self.config, &self.items, None, self.currency, now)?;
                totals.rejected_coupon = Some(error);

                Ok(totals)
            }
            priced => Ok(priced?),
        }
    }

    /// Price the order and submit it to `gateway`.
    ///
    /// Nothing is submitted if the applied coupon no longer holds; the coupon is dropped
    /// so the shopper can review the new total and pay again.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is empty, the coupon was dropped, the order cannot
    /// be priced or the payment fails.
    pub async fn pay(
        &mut self,
        gateway: &dyn PaymentGateway,
        order_reference: impl Into<String>,
        method: PaymentMethod,
        now: Timestamp,
    ) -> Result<PaymentReceipt, CheckoutError> {
        if self.items.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }

        let mut totals = self.totals(now)?;

        if let Some(error) = totals.rejected_coupon.take() {
            return Err(CheckoutError::Coupon(error));
        }

        let receipt = gateway
            .submit(PaymentRequest {
                order_reference: order_reference.into(),
                totals,
                method,
            })
            .await?;

        info!(
            reference = %receipt.reference,
            order = %receipt.order_reference,
            amount = %receipt.amount,
            "order paid"
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{USD, ZAR};
    use testresult::TestResult;

    use super::*;
    use crate::{
        payments::MockPaymentGateway,
        preferences::{MemoryPreferenceStore, MockPreferenceStore},
    };

    fn now() -> Result<Timestamp, jiff::Error> {
        "2026-03-01T12:00:00Z".parse()
    }

    fn course(id: &str, cents: i64) -> Result<OrderLineItem, crate::items::LineItemError> {
        OrderLineItem::new(id, id, Money::from_minor(cents, USD), "8 weeks")
    }

    #[test]
    fn rejects_duplicate_items() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;

        let result = session.add_item(course("web", 29_900)?);

        assert!(matches!(result, Err(CheckoutError::DuplicateItem(id)) if id == "web"));
        assert_eq!(session.items().len(), 1);

        Ok(())
    }

    #[test]
    fn removing_items_updates_totals() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.add_item(course("data", 24_900)?)?;

        let removed = session.remove_item("web")?;

        assert_eq!(removed.id(), "web");
        assert_eq!(session.totals(now()?)?.total, Money::from_minor(24_900, USD));
        assert!(matches!(
            session.remove_item("web"),
            Err(CheckoutError::UnknownItem(_))
        ));

        Ok(())
    }

    #[test]
    fn failed_coupon_keeps_previous_coupon() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.apply_coupon("welcome10", now()?)?;

        let result = session.apply_coupon("FLASH30", now()?);

        assert!(matches!(
            result,
            Err(CheckoutError::Coupon(CouponError::ExpiredCoupon { .. }))
        ));
        assert_eq!(session.coupon(), Some("WELCOME10"));
        assert_eq!(session.totals(now()?)?.discount, Money::from_minor(2_990, USD));

        Ok(())
    }

    #[test]
    fn new_coupon_replaces_applied_one() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.add_item(course("data", 24_900)?)?;
        session.apply_coupon("WELCOME10", now()?)?;
        session.apply_coupon("SAVE20", now()?)?;

        let totals = session.totals(now()?)?;

        assert_eq!(session.coupon(), Some("SAVE20"));
        assert_eq!(totals.discount, Money::from_minor(10_960, USD));
        assert_eq!(totals.total, Money::from_minor(43_840, USD));
        assert_eq!(
            totals.coupon.map(|coupon| coupon.code),
            Some("SAVE20".to_string())
        );

        Ok(())
    }

    #[test]
    fn expired_coupon_is_dropped_from_totals() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.add_item(course("data", 24_900)?)?;
        session.apply_coupon("FLASH30", "2025-12-31T00:00:00Z".parse()?)?;

        let later: Timestamp = "2026-01-01T00:00:01Z".parse()?;
        let totals = session.totals(later)?;

        assert_eq!(totals.discount, Money::from_minor(0, USD));
        assert_eq!(totals.total, Money::from_minor(54_800, USD));
        assert_eq!(totals.coupon, None);
        assert!(matches!(
            totals.rejected_coupon,
            Some(CouponError::ExpiredCoupon { ref code, .. }) if code == "FLASH30"
        ));
        assert_eq!(session.coupon(), None);

        let again = session.totals(later)?;

        assert_eq!(again.total, Money::from_minor(54_800, USD));
        assert_eq!(again.rejected_coupon, None);

        Ok(())
    }

    #[test]
    fn totals_are_stable_across_calls() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.add_item(course("data", 24_900)?)?;
        session.set_currency(CurrencyCode::Ngn);
        session.apply_coupon("WELCOME10", now()?)?;

        let first = session.totals(now()?)?;
        let second = session.totals(now()?)?;

        assert_eq!(first, second);
        assert_eq!(session.coupon(), Some("WELCOME10"));

        Ok(())
    }

    #[tokio::test]
    async fn pay_stops_when_coupon_has_expired() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.apply_coupon("FLASH30", "2025-12-31T00:00:00Z".parse()?)?;

        let mut gateway = MockPaymentGateway::new();

        gateway.expect_submit().never();

        let result = session
            .pay(&gateway, "ORD-7", PaymentMethod::BankTransfer, now()?)
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::Coupon(CouponError::ExpiredCoupon { .. }))
        ));
        assert_eq!(session.coupon(), None);

        Ok(())
    }

    #[test]
    fn clearing_coupon_restores_full_price() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.apply_coupon("SAVE20", now()?)?;

        assert_eq!(session.clear_coupon(), Some("SAVE20".to_string()));
        assert_eq!(session.totals(now()?)?.total, Money::from_minor(29_900, USD));

        Ok(())
    }

    #[test]
    fn currency_switch_recomputes_everything() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.apply_coupon("WELCOME10", now()?)?;
        session.set_currency(CurrencyCode::Zar);

        let totals = session.totals(now()?)?;

        // 299 * 18.5 = 5531.50
        assert_eq!(totals.subtotal, Money::from_minor(553_150, ZAR));
        assert_eq!(totals.discount, Money::from_minor(55_315, ZAR));
        assert_eq!(totals.total, Money::from_minor(497_835, ZAR));

        Ok(())
    }

    #[test]
    fn session_starts_in_saved_currency() -> TestResult {
        let config = PricingConfig::builtin()?;
        let store = MemoryPreferenceStore::new();

        assert_eq!(
            CheckoutSession::with_preferences(&config, &store)?.currency(),
            CurrencyCode::Usd
        );

        let mut session = CheckoutSession::new(&config);
        session.save_currency(CurrencyCode::Gbp, &store)?;

        assert_eq!(
            CheckoutSession::with_preferences(&config, &store)?.currency(),
            CurrencyCode::Gbp
        );

        Ok(())
    }

    #[test]
    fn preference_failures_surface() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut store = MockPreferenceStore::new();

        store
            .expect_load_currency()
            .once()
            .return_once(|| Err(PreferenceError::Poisoned));

        let result = CheckoutSession::with_preferences(&config, &store);

        assert!(matches!(
            result,
            Err(CheckoutError::Preferences(PreferenceError::Poisoned))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn pay_submits_computed_totals() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);

        session.add_item(course("web", 29_900)?)?;
        session.add_item(course("data", 24_900)?)?;
        session.apply_coupon("WELCOME10", now()?)?;

        let mut gateway = MockPaymentGateway::new();

        gateway
            .expect_submit()
            .once()
            .withf(|request| {
                request.order_reference == "ORD-42"
                    && request.amount() == Money::from_minor(49_320, USD)
            })
            .return_once(|request| {
                Ok(PaymentReceipt {
                    reference: "PAY-000042".to_string(),
                    order_reference: request.order_reference,
                    amount: request.totals.total,
                    charged: true,
                })
            });

        let receipt = session
            .pay(&gateway, "ORD-42", PaymentMethod::BankTransfer, now()?)
            .await?;

        assert_eq!(receipt.reference, "PAY-000042");

        Ok(())
    }

    #[tokio::test]
    async fn pay_rejects_empty_orders() -> TestResult {
        let config = PricingConfig::builtin()?;
        let mut session = CheckoutSession::new(&config);
        let mut gateway = MockPaymentGateway::new();

        gateway.expect_submit().never();

        let result = session
            .pay(&gateway, "ORD-1", PaymentMethod::BankTransfer, now()?)
            .await;

        assert!(matches!(result, Err(CheckoutError::EmptyOrder)));

        Ok(())
    }
}
