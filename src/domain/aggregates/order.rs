//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::cart::Cart;
use crate::domain::value_objects::{Money, OrderNumber};
use crate::payment::PixCharge;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    AwaitingPayment,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "PAID" => OrderStatus::Paid,
            "SHIPPED" => OrderStatus::Shipped,
            "DELIVERED" => OrderStatus::Delivered,
            "CANCELLED" => OrderStatus::Cancelled,
            _ => OrderStatus::AwaitingPayment,
        }
    }
}

/// A cart line frozen into an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Totals snapshot carried on the order; mirrors the cart summary at
/// checkout time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub items_subtotal: Money,
    pub items_discount: Money,
    pub coupon_discount: Money,
    pub total_discount: Money,
    pub grand_total: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub cep: String,
    pub phone: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: OrderNumber,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub coupon_code: Option<String>,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub shipping_address: ShippingAddress,
    pub payment: PixCharge,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Freeze a cart into a new order awaiting payment.
    pub fn from_cart(
        order_number: OrderNumber,
        customer_id: Uuid,
        cart: &Cart,
        shipping_address: ShippingAddress,
        payment: PixCharge,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            order_number,
            customer_id,
            status: OrderStatus::AwaitingPayment,
            coupon_code: cart.active_coupon_code.clone(),
            items: cart
                .items
                .iter()
                .map(|i| OrderItem {
                    product_id: i.product_id,
                    name: i.name.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                    line_total: i.line_total,
                })
                .collect(),
            totals: OrderTotals {
                items_subtotal: cart.items_subtotal,
                items_discount: cart.items_discount,
                coupon_discount: cart.coupon_discount,
                total_discount: cart.total_discount,
                grand_total: cart.grand_total,
            },
            shipping_address,
            payment,
            created_at: now,
            updated_at: now,
        }
    }
}
