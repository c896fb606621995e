//! HTTP surface: axum router, caller identity, error mapping.
//!
//! Caller identity is taken from trusted headers: `x-customer-id` for a
//! registered customer (authenticated upstream) and `x-guest-cart-id` for a
//! guest session. When both are present the customer wins.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use validator::ValidationError;

use crate::domain::aggregates::cart::CartIdentifier;
use crate::domain::events::DomainEvent;
use crate::payment::Pix;
use crate::service::cart::CartService;
use crate::service::checkout::CheckoutService;
use crate::store::{PgCartStore, PgCatalog, PgCoupons, PgOrders};
use crate::Error;

pub mod cart;
pub mod checkout;
pub mod coupons;
pub mod orders;
pub mod products;

pub type Carts = CartService<PgCatalog, PgCoupons, PgCartStore>;
pub type Checkout = CheckoutService<PgCartStore, PgCoupons, PgOrders, Pix>;

#[derive(Clone)]
pub struct AppState {
    pub carts: Carts,
    pub checkout: Checkout,
    pub catalog: PgCatalog,
    pub coupons: PgCoupons,
    pub orders: PgOrders,
    pub nats: Option<async_nats::Client>,
}

impl AppState {
    pub fn new(db: PgPool, nats: Option<async_nats::Client>) -> Self {
        let catalog = PgCatalog::new(db.clone());
        let coupons = PgCoupons::new(db.clone());
        let cart_store = PgCartStore::new(db.clone());
        let orders = PgOrders::new(db);
        Self {
            carts: CartService::new(catalog.clone(), coupons.clone(), cart_store.clone()),
            checkout: CheckoutService::new(cart_store, coupons.clone(), orders.clone(), Pix),
            catalog,
            coupons,
            orders,
            nats,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/products", get(products::list_products).post(products::create_product))
        .route(
            "/api/v1/products/:id",
            get(products::get_product).put(products::update_product).delete(products::archive_product),
        )
        .route("/api/v1/coupons", get(coupons::list_coupons).post(coupons::create_coupon))
        .route("/api/v1/cart", get(cart::get_cart))
        .route("/api/v1/cart/items", post(cart::add_item))
        .route("/api/v1/cart/items/:product_id", put(cart::update_item).delete(cart::remove_item))
        .route("/api/v1/cart/coupon", post(cart::apply_coupon).delete(cart::remove_coupon))
        .route("/api/v1/cart/merge", post(cart::merge_carts))
        .route("/api/v1/checkout", post(checkout::place_order))
        .route("/api/v1/checkout/coupon-preview", post(checkout::preview_coupon))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "storefront"}))
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn unauthorized(message: &str) -> Self {
        Self { status: StatusCode::UNAUTHORIZED, message: message.to_string() }
    }

    pub fn bad_request(message: &str) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.to_string() }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::ProductNotFound
            | Error::ItemNotFound
            | Error::CartNotFound
            | Error::CouponNotFound
            | Error::OrderNotFound => StatusCode::NOT_FOUND,
            Error::InsufficientStock | Error::StaleCart => StatusCode::CONFLICT,
            Error::InvalidQuantity
            | Error::MinPurchaseNotMet { .. }
            | Error::EmptyCart
            | Error::PaymentMethodNotAvailable(_) => StatusCode::BAD_REQUEST,
            Error::Payment(_) => StatusCode::BAD_GATEWAY,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
        }
        Self { status, message: err.to_string() }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: errors.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({"error": self.message}))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// =============================================================================
// Caller identity
// =============================================================================

/// Cart identity resolved from request headers.
pub struct Identity(pub CartIdentifier);

impl Identity {
    /// The registered customer id, or 401 for guest/anonymous callers.
    pub fn require_customer(&self) -> ApiResult<Uuid> {
        self.0
            .customer_id
            .ok_or_else(|| ApiError::unauthorized("Customer identity required"))
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_uuid = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| Uuid::parse_str(v.trim()).ok())
        };
        Ok(Identity(CartIdentifier {
            customer_id: header_uuid("x-customer-id"),
            guest_cart_id: header_uuid("x-guest-cart-id"),
        }))
    }
}

// =============================================================================
// Shared response/validation helpers
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("must not be negative"));
    }
    Ok(())
}

pub(crate) fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() || value.is_zero() {
        return Err(ValidationError::new("must be positive"));
    }
    Ok(())
}

/// Best-effort event publish; a broker hiccup never fails the request.
pub(crate) async fn publish_event(
    nats: &Option<async_nats::Client>,
    subject: &str,
    event: &DomainEvent,
) {
    let Some(client) = nats else { return };
    match serde_json::to_vec(event) {
        Ok(payload) => {
            if let Err(err) = client.publish(subject.to_string(), payload.into()).await {
                tracing::warn!(%subject, error = %err, "failed to publish event");
            }
        }
        Err(err) => tracing::warn!(%subject, error = %err, "failed to serialize event"),
    }
}
