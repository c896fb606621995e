//! Storefront - Self-hosted E-commerce Backend
//!
//! ## Features
//! - Product catalog with promotional pricing
//! - Persistent shopping cart (registered customers and guests)
//! - Coupon application with automatic revalidation
//! - Checkout with sequential order numbers and mock PIX payment
//! - Optional NATS event publishing

use thiserror::Error;

use crate::domain::value_objects::Money;

pub mod domain;
pub mod http;
pub mod payment;
pub mod service;
pub mod store;

// =============================================================================
// Error Types
// =============================================================================

/// Failures surfaced by the storefront services.
///
/// Every error aborts the operation before anything is persisted. The
/// "coupon dropped" advisory of the cart engine is intentionally *not* here,
/// it travels alongside successful mutations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Product is not in the cart")]
    ItemNotFound,

    #[error("Cart not found")]
    CartNotFound,

    #[error("Coupon is invalid or expired")]
    CouponNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Requested quantity exceeds the available stock")]
    InsufficientStock,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("A minimum purchase of {minimum} is required to use this coupon")]
    MinPurchaseNotMet { minimum: Money },

    #[error("Cart was modified by a concurrent request, retry the operation")]
    StaleCart,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Payment method '{0}' is not available")]
    PaymentMethodNotAvailable(String),

    #[error("Payment failed: {0}")]
    Payment(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
