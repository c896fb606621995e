//! Checkout: turn a customer's cart into an order awaiting PIX payment.
//!
//! Order numbers are human-readable and sequential per day
//! (`YYYYMMDD-NNNN`). The payment charge is requested *before* the order is
//! written; a gateway failure therefore never leaves an order behind. Order
//! persistence and the cart clear happen in one transaction.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::cart::CartIdentifier;
use crate::domain::aggregates::order::{Order, ShippingAddress};
use crate::domain::value_objects::{Money, OrderNumber};
use crate::payment::{ChargeRequest, PaymentGateway};
use crate::service::revalidate_coupon;
use crate::store::{CartStore, Coupons, Orders};
use crate::{Error, Result};

const PIX_METHOD: &str = "pix";

#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub payment_method: String,
    pub shipping_address: ShippingAddress,
}

/// Discount simulation for a coupon against the customer's current cart,
/// without touching the cart.
#[derive(Clone, Debug, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub discount: Money,
    pub total: Money,
}

#[derive(Clone, Debug)]
pub struct CheckoutService<S, K, O, P> {
    carts: S,
    coupons: K,
    orders: O,
    gateway: P,
}

impl<S, K, O, P> CheckoutService<S, K, O, P>
where
    S: CartStore,
    K: Coupons,
    O: Orders,
    P: PaymentGateway,
{
    pub fn new(carts: S, coupons: K, orders: O, gateway: P) -> Self {
        Self { carts, coupons, orders, gateway }
    }

    pub async fn create_order(&self, customer_id: Uuid, request: PlaceOrder) -> Result<Order> {
        let identifier = CartIdentifier::customer(customer_id);
        let mut cart = self.carts.find(&identifier).await?.ok_or(Error::EmptyCart)?;
        if cart.is_empty() {
            return Err(Error::EmptyCart);
        }
        if request.payment_method != PIX_METHOD {
            return Err(Error::PaymentMethodNotAvailable(request.payment_method));
        }

        // the coupon may have expired or been retuned while the cart sat idle
        revalidate_coupon(&self.coupons, &mut cart).await?;
        cart.recompute_totals();
        let cart = self.carts.save(cart).await?;

        let prefix = OrderNumber::date_prefix(Utc::now().date_naive());
        let order_number = match self.orders.last_number_with_prefix(&prefix).await? {
            Some(last) => OrderNumber::parse(&last)
                .map_err(|e| Error::Storage(e.to_string()))?
                .next(),
            None => OrderNumber::first(&prefix),
        };

        let charge = self
            .gateway
            .process(&ChargeRequest {
                recipient_name: request.shipping_address.recipient_name.clone(),
                total: cart.grand_total,
                order_number: order_number.clone(),
            })
            .await?;

        let order = Order::from_cart(order_number, customer_id, &cart, request.shipping_address, charge);
        let order = self.orders.create_with_cart_clear(order, cart.id).await?;
        tracing::info!(order = %order.order_number, customer = %customer_id, total = %order.totals.grand_total, "order created");
        Ok(order)
    }

    pub async fn preview_coupon(&self, customer_id: Uuid, code: &str) -> Result<CouponPreview> {
        let cart = self
            .carts
            .find(&CartIdentifier::customer(customer_id))
            .await?
            .ok_or(Error::EmptyCart)?;
        if cart.is_empty() {
            return Err(Error::EmptyCart);
        }

        let code = code.trim().to_uppercase();
        let coupon = self.coupons.by_code(&code).await?.ok_or(Error::CouponNotFound)?;
        let eligible = cart.eligible_subtotal();
        if eligible < coupon.min_purchase_value {
            return Err(Error::MinPurchaseNotMet { minimum: coupon.min_purchase_value });
        }
        let discount = coupon.discount_for(eligible);
        Ok(CouponPreview { code: coupon.code, discount, total: eligible - discount })
    }
}
