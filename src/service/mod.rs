//! Application services orchestrating the domain against the stores.

use serde::Serialize;

use crate::domain::aggregates::cart::Cart;
use crate::store::Coupons;
use crate::Result;

pub mod cart;
pub mod checkout;

/// Advisory detail attached to a *successful* mutation whose side effect was
/// dropping a previously applied coupon. Never an error.
#[derive(Clone, Debug, Serialize)]
pub struct CouponNotice {
    pub status: String,
    pub code: String,
    pub reason: String,
}

impl CouponNotice {
    fn removed(code: String) -> Self {
        Self {
            status: "REMOVED".to_string(),
            code,
            reason: "Coupon removed: the purchase requirements are no longer met.".to_string(),
        }
    }
}

/// Re-check an applied coupon against the cart's current contents.
///
/// The coupon is re-fetched so a record deactivated, expired or retuned since
/// application is picked up. An ineligible coupon is dropped from the cart
/// and reported as an advisory notice; an eligible one has its discount
/// recomputed from the refreshed record.
pub(crate) async fn revalidate_coupon<K: Coupons>(
    coupons: &K,
    cart: &mut Cart,
) -> Result<Option<CouponNotice>> {
    let Some(code) = cart.active_coupon_code.clone() else {
        return Ok(None);
    };
    let coupon = coupons.by_code(&code).await?;
    let eligible = cart.eligible_subtotal();
    match coupon {
        Some(coupon) if eligible >= coupon.min_purchase_value => {
            cart.coupon_discount = coupon.discount_for(eligible);
            Ok(None)
        }
        _ => {
            cart.clear_coupon();
            tracing::debug!(cart = %cart.id, %code, "coupon dropped during revalidation");
            Ok(Some(CouponNotice::removed(code)))
        }
    }
}
