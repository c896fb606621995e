//! Domain events
//!
//! Published to NATS when the service is configured with a broker; consumers
//! (notification jobs, analytics) live outside this repository.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Cart(CartEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order_id: Uuid,
        order_number: String,
        customer_id: Uuid,
        total: Decimal,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CartEvent {
    CouponDropped { cart_id: Uuid, code: String },
}
