//! Payment submission
//!
//! Checkout hands computed totals to a [`PaymentGateway`]. The gateway only ever sees
//! the final amount; it never re-prices an order.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use mockall::automock;
use rusty_money::{Money, iso::Currency};
use smallvec::{SmallVec, smallvec};
use thiserror::Error;
use tracing::{info, warn};

use crate::{currency::CurrencyCode, pricing::OrderTotals};

/// Errors returned by a payment gateway.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    /// The card issuer declined the charge.
    #[error("card ending {last4} was declined")]
    Declined {
        /// Last four digits of the card
        last4: String,
    },

    /// The method is not accepted for the order currency.
    #[error("{method} is not available for {currency} orders")]
    MethodUnavailable {
        /// Rejected method
        method: PaymentMethod,

        /// Order currency
        currency: CurrencyCode,
    },

    /// The order reference was empty.
    #[error("order reference must not be empty")]
    MissingReference,
}

/// How the shopper pays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Debit or credit card
    Card {
        /// Last four digits, used for display and declines
        last4: String,
    },

    /// Direct bank transfer
    BankTransfer,

    /// Mobile money wallet, NGN and KES only
    MobileMoney,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card { last4 } => write!(f, "card ending {last4}"),
            PaymentMethod::BankTransfer => f.write_str("bank transfer"),
            PaymentMethod::MobileMoney => f.write_str("mobile money"),
        }
    }
}

/// A charge for an already priced order.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    /// Merchant order reference
    pub order_reference: String,

    /// Totals computed at checkout
    pub totals: OrderTotals,

    /// Chosen payment method
    pub method: PaymentMethod,
}

impl PaymentRequest {
    /// Amount to charge.
    pub fn amount(&self) -> Money<'static, Currency> {
        self.totals.total
    }
}

/// Confirmation of an accepted payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    /// Gateway reference, e.g. `PAY-000001`
    pub reference: String,

    /// Merchant order reference
    pub order_reference: String,

    /// Amount charged
    pub amount: Money<'static, Currency>,

    /// Whether money actually moved; false for free orders
    pub charged: bool,
}

/// Something that can take payment for an order.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit a payment for processing.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the payment is refused.
    async fn submit(&self, request: PaymentRequest) -> Result<PaymentReceipt, PaymentError>;
}

/// Gateway that simulates network latency and declines configured test cards.
#[derive(Debug)]
pub struct SimulatedGateway {
    latency: Duration,
    declined_cards: SmallVec<[String; 2]>,
    next_reference: AtomicU64,
}

impl SimulatedGateway {
    /// Default simulated round-trip
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1_500);

    /// Card ending used to exercise declines
    pub const DECLINED_TEST_CARD: &'static str = "0002";

    /// Create a gateway with the given latency that declines the test card.
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            declined_cards: smallvec![Self::DECLINED_TEST_CARD.to_string()],
            next_reference: AtomicU64::new(1),
        }
    }

    /// Also decline cards ending in `last4`.
    #[must_use]
    pub fn declining(mut self, last4: impl Into<String>) -> Self {
        self.declined_cards.push(last4.into());
        self
    }

    fn reference(&self) -> String {
        format!("PAY-{:06}", self.next_reference.fetch_add(1, Ordering::Relaxed))
    }

    fn check_method(&self, request: &PaymentRequest) -> Result<(), PaymentError> {
        match &request.method {
            PaymentMethod::Card { last4 } if self.declined_cards.contains(last4) => {
                Err(PaymentError::Declined {
                    last4: last4.clone(),
                })
            }
            PaymentMethod::MobileMoney
                if !matches!(request.totals.currency, CurrencyCode::Ngn | CurrencyCode::Kes) =>
            {
                Err(PaymentError::MethodUnavailable {
                    method: request.method.clone(),
                    currency: request.totals.currency,
                })
            }
            _ => Ok(()),
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LATENCY)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    #[tracing::instrument(
        name = "payments.submit",
        skip(self, request),
        fields(order = %request.order_reference, amount = %request.amount())
    )]
    async fn submit(&self, request: PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
        if request.order_reference.trim().is_empty() {
            return Err(PaymentError::MissingReference);
        }

        if request.totals.is_free() {
            info!("free order accepted without charge");

            return Ok(PaymentReceipt {
                reference: self.reference(),
                order_reference: request.order_reference,
                amount: request.totals.total,
                charged: false,
            });
        }

        tokio::time::sleep(self.latency).await;

        if let Err(error) = self.check_method(&request) {
            warn!(%error, "payment rejected");
            return Err(error);
        }

        let receipt = PaymentReceipt {
            reference: self.reference(),
            order_reference: request.order_reference,
            amount: request.totals.total,
            charged: true,
        };

        info!(reference = %receipt.reference, "payment accepted");

        Ok(receipt)
    }
}
