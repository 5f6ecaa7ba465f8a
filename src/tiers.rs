//! Bulk tiers
//!
//! Organizations buying seats for their staff get a discount that depends on head
//! count. Tiers are contiguous seat ranges starting at one; a staff count maps to the
//! single tier whose range contains it.

use decimal_percentage::Percentage;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    currency::CurrencyCode,
    discounts::{DiscountError, is_unit_percentage, percent_of_minor},
    exchange::{ExchangeError, ExchangeRates},
};

/// Errors raised by tier tables and lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TierError {
    /// Staff counts start at one.
    #[error("staff count must be at least 1, got {0}")]
    InvalidStaffCount(u32),

    /// The staff count is larger than the biggest tier; these deals are negotiated.
    #[error("staff count {staff_count} is above the largest tier ({max_seats} seats)")]
    BeyondTopTier {
        /// Requested staff count
        staff_count: u32,
        /// Upper bound of the last tier
        max_seats: u32,
    },

    /// A tier table needs at least one tier.
    #[error("tier table is empty")]
    Empty,

    /// The first tier must start at one seat.
    #[error("first tier must start at 1 seat, starts at {0}")]
    DoesNotStartAtOne(u32),

    /// A tier's lower bound is above its upper bound.
    #[error("tier `{0}` has min_seats above max_seats")]
    InvertedRange(String),

    /// A tier follows one that already runs to the largest possible staff count.
    #[error("tier `{0}` overlaps a tier that has no upper bound")]
    AfterUnboundedTier(String),

    /// Adjacent tiers leave a gap or overlap.
    #[error("tier `{label}` must start at {expected} seats, starts at {found}")]
    NotContiguous {
        /// Offending tier
        label: String,
        /// One past the previous tier's upper bound
        expected: u32,
        /// Actual lower bound
        found: u32,
    },

    /// Tier discounts must sit within `0%..=100%`.
    #[error("discount for tier `{0}` must be between 0% and 100%")]
    DiscountOutOfRange(String),

    /// Price arithmetic overflowed.
    #[error("seat price overflowed")]
    Overflow,

    /// Wrapped conversion error.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl From<DiscountError> for TierError {
    fn from(_error: DiscountError) -> Self {
        TierError::Overflow
    }
}

/// An inclusive seat range and its discount.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkTier {
    /// Lowest staff count in this tier
    pub min_seats: u32,

    /// Highest staff count in this tier
    pub max_seats: u32,

    /// Discount on the per-seat price
    pub discount: Percentage,

    /// Tier name shown on the pricing page
    pub label: String,
}

impl BulkTier {
    /// Create a tier covering `min_seats..=max_seats`.
    pub fn new(
        min_seats: u32,
        max_seats: u32,
        discount: Percentage,
        label: impl Into<String>,
    ) -> Self {
        Self {
            min_seats,
            max_seats,
            discount,
            label: label.into(),
        }
    }

    /// Whether `staff_count` falls in this tier.
    pub fn contains(&self, staff_count: u32) -> bool {
        (self.min_seats..=self.max_seats).contains(&staff_count)
    }
}

/// A validated, ordered tier table.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkTiers {
    tiers: Vec<BulkTier>,
}

impl BulkTiers {
    /// Validate and build a tier table. Tiers may be given in any order.
    ///
    /// # Errors
    ///
    /// Returns a [`TierError`] if the table is empty, does not start at one seat, has an
    /// inverted range, leaves gaps or overlaps, or carries a discount outside
    /// `0%..=100%`.
    pub fn new(tiers: impl IntoIterator<Item = BulkTier>) -> Result<Self, TierError> {
        let mut tiers: Vec<BulkTier> = tiers.into_iter().collect();
        tiers.sort_by_key(|tier| tier.min_seats);

        let first = tiers.first().ok_or(TierError::Empty)?;

        if first.min_seats != 1 {
            return Err(TierError::DoesNotStartAtOne(first.min_seats));
        }

        let mut next_min = Some(1_u32);

        for tier in &tiers {
            if tier.min_seats > tier.max_seats {
                return Err(TierError::InvertedRange(tier.label.clone()));
            }

            let Some(expected) = next_min else {
                return Err(TierError::AfterUnboundedTier(tier.label.clone()));
            };

            if tier.min_seats != expected {
                return Err(TierError::NotContiguous {
                    label: tier.label.clone(),
                    expected,
                    found: tier.min_seats,
                });
            }

            if !is_unit_percentage(&tier.discount) {
                return Err(TierError::DiscountOutOfRange(tier.label.clone()));
            }

            next_min = tier.max_seats.checked_add(1);
        }

        Ok(Self { tiers })
    }

    /// Tiers in seat order
    pub fn tiers(&self) -> &[BulkTier] {
        &self.tiers
    }

    /// Largest staff count any tier covers.
    pub fn max_seats(&self) -> u32 {
        self.tiers.last().map_or(0, |tier| tier.max_seats)
    }

    /// Find the tier containing `staff_count`.
    ///
    /// # Errors
    ///
    /// - [`TierError::InvalidStaffCount`]: `staff_count` is zero.
    /// - [`TierError::BeyondTopTier`]: `staff_count` is above the last tier.
    pub fn resolve(&self, staff_count: u32) -> Result<&BulkTier, TierError> {
        if staff_count == 0 {
            return Err(TierError::InvalidStaffCount(staff_count));
        }

        self.tiers
            .iter()
            .find(|tier| tier.contains(staff_count))
            .ok_or(TierError::BeyondTopTier {
                staff_count,
                max_seats: self.max_seats(),
            })
    }

    /// Price `staff_count` seats of a course for an organization.
    ///
    /// # Errors
    ///
    /// Returns a [`TierError`] if the staff count has no tier or conversion fails.
    #[tracing::instrument(name = "tiers.quote_seats", skip(self, rates, unit_price))]
    pub fn quote_seats(
        &self,
        rates: &ExchangeRates,
        unit_price: &Money<'static, Currency>,
        staff_count: u32,
        currency: CurrencyCode,
    ) -> Result<SeatQuote, TierError> {
        let tier = self.resolve(staff_count)?.clone();
        let seat_price = rates.convert(unit_price, currency)?;
        let display = seat_price.currency();

        let gross_minor = seat_price
            .to_minor_units()
            .checked_mul(i64::from(staff_count))
            .ok_or(TierError::Overflow)?;

        let discount_minor = percent_of_minor(&tier.discount, gross_minor)?;

        Ok(SeatQuote {
            tier,
            seats: staff_count,
            seat_price,
            gross: Money::from_minor(gross_minor, display),
            discount: Money::from_minor(discount_minor, display),
            net: Money::from_minor(gross_minor - discount_minor, display),
        })
    }
}

/// An organization seat purchase priced against its tier.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatQuote {
    /// Tier the staff count falls into
    pub tier: BulkTier,

    /// Number of seats
    pub seats: u32,

    /// Undiscounted price of one seat in the display currency
    pub seat_price: Money<'static, Currency>,

    /// `seat_price × seats`
    pub gross: Money<'static, Currency>,

    /// Tier discount on the gross amount
    pub discount: Money<'static, Currency>,

    /// Amount payable
    pub net: Money<'static, Currency>,
}
