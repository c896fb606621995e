//! Checkout endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::domain::aggregates::order::{Order, ShippingAddress};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::http::{publish_event, ApiResult, AppState, Identity};
use crate::service::checkout::{CouponPreview, PlaceOrder};

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingAddressRequest {
    #[validate(length(min = 1, max = 120))]
    pub recipient_name: String,
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 20))]
    pub number: String,
    pub complement: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub neighborhood: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 2, max = 2))]
    pub state: String,
    #[validate(length(min = 8, max = 9))]
    pub cep: String,
    #[validate(length(min = 8, max = 20))]
    pub phone: String,
}

impl From<ShippingAddressRequest> for ShippingAddress {
    fn from(request: ShippingAddressRequest) -> Self {
        ShippingAddress {
            recipient_name: request.recipient_name,
            street: request.street,
            number: request.number,
            complement: request.complement,
            neighborhood: request.neighborhood,
            city: request.city,
            state: request.state,
            cep: request.cep,
            phone: request.phone,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, max = 40))]
    pub payment_method: String,
    #[validate]
    pub shipping_address: ShippingAddressRequest,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CouponPreviewRequest {
    #[validate(length(min = 1, max = 40))]
    pub code: String,
}

pub async fn place_order(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let customer = identity.require_customer()?;
    request.validate()?;

    let order = state
        .checkout
        .create_order(
            customer,
            PlaceOrder {
                payment_method: request.payment_method,
                shipping_address: request.shipping_address.into(),
            },
        )
        .await?;

    let event = DomainEvent::Order(OrderEvent::Created {
        order_id: order.id,
        order_number: order.order_number.to_string(),
        customer_id: order.customer_id,
        total: order.totals.grand_total.amount(),
    });
    publish_event(&state.nats, "storefront.orders", &event).await;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn preview_coupon(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CouponPreviewRequest>,
) -> ApiResult<Json<CouponPreview>> {
    let customer = identity.require_customer()?;
    request.validate()?;
    let preview = state.checkout.preview_coupon(customer, &request.code).await?;
    Ok(Json(preview))
}
