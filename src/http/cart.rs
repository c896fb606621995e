//! Cart endpoints.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::cart::{CartItem, CouponSnapshot};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::Money;
use crate::http::{publish_event, ApiResult, AppState, Identity};
use crate::service::cart::CartMutation;
use crate::service::CouponNotice;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, max = 40))]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub guest_cart_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CartSummary {
    pub items_subtotal: Money,
    pub items_discount: Money,
    pub coupon_discount: Money,
    pub total_discount: Money,
    pub grand_total: Money,
    pub total_items: u32,
}

/// Response envelope mirroring the cart: owner, summary, coupon, items, plus
/// the advisory details of the mutation that produced it.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_cart_id: Option<Uuid>,
    pub summary: CartSummary,
    pub coupon: Option<CouponSnapshot>,
    pub items: Vec<CartItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_guest_cart_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CouponNotice>,
}

impl From<CartMutation> for CartResponse {
    fn from(mutation: CartMutation) -> Self {
        let cart = mutation.cart;
        Self {
            customer_id: cart.owner.customer_id(),
            guest_cart_id: cart.owner.guest_id(),
            summary: CartSummary {
                items_subtotal: cart.items_subtotal,
                items_discount: cart.items_discount,
                coupon_discount: cart.coupon_discount,
                total_discount: cart.total_discount,
                grand_total: cart.grand_total,
                total_items: cart.total_items,
            },
            coupon: cart.coupon_snapshot,
            items: cart.items,
            new_guest_cart_id: mutation.new_guest_cart_id,
            details: mutation.coupon_notice,
        }
    }
}

/// Renders the mutation; a freshly minted guest id is also echoed as a
/// response header so clients can persist it.
fn respond(mutation: CartMutation) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(guest_id) = mutation.new_guest_cart_id {
        if let Ok(value) = HeaderValue::from_str(&guest_id.to_string()) {
            headers.insert("x-guest-cart-id", value);
        }
    }
    (headers, Json(CartResponse::from(mutation))).into_response()
}

async fn notify_coupon_drop(state: &AppState, mutation: &CartMutation) {
    if let Some(notice) = &mutation.coupon_notice {
        let event = DomainEvent::Cart(CartEvent::CouponDropped {
            cart_id: mutation.cart.id,
            code: notice.code.clone(),
        });
        publish_event(&state.nats, "storefront.carts", &event).await;
    }
}

pub async fn get_cart(State(state): State<AppState>, identity: Identity) -> ApiResult<Response> {
    let mutation = state.carts.get_cart(&identity.0).await?;
    Ok(respond(mutation))
}

pub async fn add_item(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<AddItemRequest>,
) -> ApiResult<Response> {
    request.validate()?;
    let mutation = state.carts.add_item(&identity.0, request.product_id, request.quantity).await?;
    notify_coupon_drop(&state, &mutation).await;
    Ok(respond(mutation))
}

pub async fn update_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateQuantityRequest>,
) -> ApiResult<Response> {
    request.validate()?;
    let mutation = state
        .carts
        .update_item_quantity(&identity.0, product_id, request.quantity)
        .await?;
    notify_coupon_drop(&state, &mutation).await;
    Ok(respond(mutation))
}

pub async fn remove_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Response> {
    let mutation = state.carts.remove_item(&identity.0, product_id).await?;
    notify_coupon_drop(&state, &mutation).await;
    Ok(respond(mutation))
}

pub async fn apply_coupon(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<ApplyCouponRequest>,
) -> ApiResult<Response> {
    request.validate()?;
    let mutation = state.carts.apply_coupon(&identity.0, &request.code).await?;
    Ok(respond(mutation))
}

pub async fn remove_coupon(State(state): State<AppState>, identity: Identity) -> ApiResult<Response> {
    let mutation = state.carts.remove_coupon(&identity.0).await?;
    Ok(respond(mutation))
}

pub async fn merge_carts(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<MergeRequest>,
) -> ApiResult<Response> {
    let customer = identity.require_customer()?;
    let mutation = state.carts.merge_carts(customer, request.guest_cart_id).await?;
    notify_coupon_drop(&state, &mutation).await;
    Ok(respond(mutation))
}
