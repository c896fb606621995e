//! Collaborator contracts of the cart engine and checkout, plus their
//! Postgres implementations.
//!
//! The engine never mutates catalog or coupon state; it only reads current
//! values to validate. The traits exist so services can be exercised against
//! in-memory doubles.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::aggregates::cart::{Cart, CartIdentifier, CartOwner};
use crate::domain::aggregates::coupon::{Coupon, CouponKind};
use crate::domain::aggregates::order::Order;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Money;
use crate::Result;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::{PgCartStore, PgCatalog, PgCoupons, PgOrders};

/// Read access to the product catalog.
pub trait Catalog: Send + Sync {
    /// Current state of a purchasable product; archived and draft products
    /// are not visible here.
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;
}

/// Read access to redeemable coupons.
pub trait Coupons: Send + Sync {
    /// Look a coupon up by code. Inactive or expired coupons are reported as
    /// absent, never returned.
    async fn by_code(&self, code: &str) -> Result<Option<Coupon>>;
}

/// Durable keyed storage for carts, one per owner.
pub trait CartStore: Send + Sync {
    async fn find(&self, identifier: &CartIdentifier) -> Result<Option<Cart>>;

    async fn create(&self, owner: CartOwner) -> Result<Cart>;

    /// Persist a cart snapshot. The write compare-and-swaps on the cart's
    /// `version`; saving a snapshot that lost a race fails with
    /// [`crate::Error::StaleCart`] and nothing is written.
    async fn save(&self, cart: Cart) -> Result<Cart>;

    async fn delete_guest(&self, guest_cart_id: Uuid) -> Result<()>;
}

/// Order persistence used by checkout.
pub trait Orders: Send + Sync {
    /// Highest persisted order number for a `YYYYMMDD` day prefix, if any.
    async fn last_number_with_prefix(&self, prefix: &str) -> Result<Option<String>>;

    /// Persist the order and empty the originating cart in one transaction.
    async fn create_with_cart_clear(&self, order: Order, cart_id: Uuid) -> Result<Order>;
}

// =============================================================================
// Admin / listing parameter types
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub in_promotion: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub main_image_url: Option<String>,
    pub list_price: Money,
    pub promotional_price: Option<Money>,
    pub promotion_active: bool,
    pub stock_quantity: u32,
}

#[derive(Clone, Debug)]
pub struct ProductUpdate {
    pub name: String,
    pub description: String,
    pub main_image_url: Option<String>,
    pub list_price: Money,
    pub promotional_price: Option<Money>,
    pub promotion_active: bool,
    pub stock_quantity: u32,
}

#[derive(Clone, Debug)]
pub struct NewCoupon {
    pub code: String,
    pub kind: CouponKind,
    pub value: Decimal,
    pub min_purchase_value: Money,
    pub description: String,
    pub is_active: bool,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct CouponFilter {
    pub is_active: Option<bool>,
    pub page: u32,
    pub per_page: u32,
}
