//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    /// A flat amount off the eligible subtotal.
    Fixed,
    /// A percentage of the eligible subtotal.
    Percentage,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::Fixed => "fixed",
            CouponKind::Percentage => "percentage",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "percentage" => CouponKind::Percentage,
            _ => CouponKind::Fixed,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    /// Stored uppercase; lookups normalize before comparing.
    pub code: String,
    pub kind: CouponKind,
    pub value: Decimal,
    pub min_purchase_value: Money,
    pub description: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the coupon can currently be redeemed at all. Lookups treat a
    /// coupon failing this as not found.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }

    /// Discount granted against a post-promotion, pre-coupon subtotal.
    ///
    /// A fixed discount never exceeds the subtotal itself, so the grand total
    /// cannot go below zero.
    pub fn discount_for(&self, eligible_subtotal: Money) -> Money {
        match self.kind {
            CouponKind::Fixed => Money::new(self.value).min(eligible_subtotal),
            CouponKind::Percentage => eligible_subtotal.percent(self.value),
        }
    }
}
