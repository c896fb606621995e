//! Postgres-backed stores.
//!
//! Cart lines and order snapshots are stored as JSONB documents inside their
//! aggregate rows; everything else is plain columns.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::cart::{Cart, CartIdentifier, CartOwner, CouponSnapshot};
use crate::domain::aggregates::coupon::{Coupon, CouponKind};
use crate::domain::aggregates::order::{Order, OrderStatus};
use crate::domain::aggregates::product::{Product, ProductStatus};
use crate::domain::value_objects::{Money, OrderNumber};
use crate::store::{
    CartStore, Catalog, CouponFilter, Coupons, NewCoupon, NewProduct, Orders, ProductFilter,
    ProductUpdate,
};
use crate::{Error, Result};

// =============================================================================
// Catalog
// =============================================================================

#[derive(Clone, Debug)]
pub struct PgCatalog {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    description: String,
    main_image_url: Option<String>,
    list_price: Decimal,
    promotional_price: Option<Decimal>,
    promotion_active: bool,
    stock_quantity: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            main_image_url: row.main_image_url,
            list_price: Money::new(row.list_price),
            promotional_price: row.promotional_price.map(Money::new),
            promotion_active: row.promotion_active,
            stock_quantity: u32::try_from(row.stock_quantity).unwrap_or(0),
            status: ProductStatus::from_str(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_LIST_WHERE: &str = "status = 'active'
       AND ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%')
       AND ($2::BOOLEAN IS FALSE OR promotion_active)
       AND ($3::NUMERIC IS NULL OR (CASE WHEN promotion_active AND promotional_price IS NOT NULL THEN promotional_price ELSE list_price END) >= $3)
       AND ($4::NUMERIC IS NULL OR (CASE WHEN promotion_active AND promotional_price IS NOT NULL THEN promotional_price ELSE list_price END) <= $4)";

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Public catalog listing; price filters apply to the effective price.
    pub async fn list(&self, filter: &ProductFilter) -> Result<(Vec<Product>, i64)> {
        let limit = i64::from(filter.per_page);
        let offset = i64::from(filter.page.saturating_sub(1)) * limit;
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT * FROM products WHERE {PRODUCT_LIST_WHERE} ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(&filter.search)
        .bind(filter.in_promotion.unwrap_or(false))
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM products WHERE {PRODUCT_LIST_WHERE}"
        ))
        .bind(&filter.search)
        .bind(filter.in_promotion.unwrap_or(false))
        .bind(filter.min_price)
        .bind(filter.max_price)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Product::from).collect(), total.0))
    }

    pub async fn create(&self, new: NewProduct) -> Result<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            "INSERT INTO products (id, sku, name, description, main_image_url, list_price, promotional_price, promotion_active, stock_quantity, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active', NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&new.sku)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.main_image_url)
        .bind(new.list_price.amount())
        .bind(new.promotional_price.map(|p| p.amount()))
        .bind(new.promotion_active)
        .bind(i32::try_from(new.stock_quantity).unwrap_or(i32::MAX))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn update(&self, id: Uuid, update: ProductUpdate) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET name = $2, description = $3, main_image_url = $4, list_price = $5, promotional_price = $6, promotion_active = $7, stock_quantity = $8, updated_at = NOW()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.main_image_url)
        .bind(update.list_price.amount())
        .bind(update.promotional_price.map(|p| p.amount()))
        .bind(update.promotion_active)
        .bind(i32::try_from(update.stock_quantity).unwrap_or(i32::MAX))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    pub async fn archive(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE products SET status = 'archived', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Catalog for PgCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }
}

// =============================================================================
// Coupons
// =============================================================================

#[derive(Clone, Debug)]
pub struct PgCoupons {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    kind: String,
    value: Decimal,
    min_purchase_value: Decimal,
    description: String,
    is_active: bool,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Coupon {
            id: row.id,
            code: row.code,
            kind: CouponKind::from_str(&row.kind),
            value: row.value,
            min_purchase_value: Money::new(row.min_purchase_value),
            description: row.description,
            is_active: row.is_active,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

impl PgCoupons {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewCoupon) -> Result<Coupon> {
        let row = sqlx::query_as::<_, CouponRow>(
            "INSERT INTO coupons (id, code, kind, value, min_purchase_value, description, is_active, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(new.code.trim().to_uppercase())
        .bind(new.kind.as_str())
        .bind(new.value)
        .bind(new.min_purchase_value.amount())
        .bind(&new.description)
        .bind(new.is_active)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn list(&self, filter: &CouponFilter) -> Result<(Vec<Coupon>, i64)> {
        let limit = i64::from(filter.per_page);
        let offset = i64::from(filter.page.saturating_sub(1)) * limit;
        let rows = sqlx::query_as::<_, CouponRow>(
            "SELECT * FROM coupons WHERE ($1::BOOLEAN IS NULL OR is_active = $1)
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM coupons WHERE ($1::BOOLEAN IS NULL OR is_active = $1)")
                .bind(filter.is_active)
                .fetch_one(&self.pool)
                .await?;

        Ok((rows.into_iter().map(Coupon::from).collect(), total.0))
    }
}

impl Coupons for PgCoupons {
    async fn by_code(&self, code: &str) -> Result<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT * FROM coupons WHERE code = $1 AND is_active = TRUE AND expires_at > NOW()",
        )
        .bind(code.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Coupon::from))
    }
}

// =============================================================================
// Carts
// =============================================================================

#[derive(Clone, Debug)]
pub struct PgCartStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    customer_id: Option<Uuid>,
    guest_cart_id: Option<Uuid>,
    items: serde_json::Value,
    items_subtotal: Decimal,
    items_discount: Decimal,
    coupon_discount: Decimal,
    total_discount: Decimal,
    grand_total: Decimal,
    total_items: i32,
    active_coupon_code: Option<String>,
    coupon_description: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = Error;

    fn try_from(row: CartRow) -> Result<Self> {
        let owner = match (row.customer_id, row.guest_cart_id) {
            (Some(customer), None) => CartOwner::Customer(customer),
            (None, Some(guest)) => CartOwner::Guest(guest),
            _ => return Err(Error::Storage(format!("cart {} has no single owner", row.id))),
        };
        let coupon_snapshot = row.active_coupon_code.as_ref().map(|code| CouponSnapshot {
            code: code.clone(),
            description: row.coupon_description.clone().unwrap_or_default(),
        });
        Ok(Cart {
            id: row.id,
            owner,
            items: serde_json::from_value(row.items)?,
            items_subtotal: Money::new(row.items_subtotal),
            items_discount: Money::new(row.items_discount),
            coupon_discount: Money::new(row.coupon_discount),
            total_discount: Money::new(row.total_discount),
            grand_total: Money::new(row.grand_total),
            total_items: u32::try_from(row.total_items).unwrap_or(0),
            active_coupon_code: row.active_coupon_code,
            coupon_snapshot,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CartStore for PgCartStore {
    async fn find(&self, identifier: &CartIdentifier) -> Result<Option<Cart>> {
        let row: Option<CartRow> = if let Some(customer) = identifier.customer_id {
            sqlx::query_as("SELECT * FROM carts WHERE customer_id = $1")
                .bind(customer)
                .fetch_optional(&self.pool)
                .await?
        } else if let Some(guest) = identifier.guest_cart_id {
            sqlx::query_as("SELECT * FROM carts WHERE guest_cart_id = $1")
                .bind(guest)
                .fetch_optional(&self.pool)
                .await?
        } else {
            None
        };
        row.map(Cart::try_from).transpose()
    }

    async fn create(&self, owner: CartOwner) -> Result<Cart> {
        let cart = Cart::new(owner);
        sqlx::query(
            "INSERT INTO carts (id, customer_id, guest_cart_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(cart.id)
        .bind(owner.customer_id())
        .bind(owner.guest_id())
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(cart)
    }

    async fn save(&self, cart: Cart) -> Result<Cart> {
        let row = sqlx::query_as::<_, CartRow>(
            "UPDATE carts SET items = $2, items_subtotal = $3, items_discount = $4, coupon_discount = $5, total_discount = $6, grand_total = $7, total_items = $8, active_coupon_code = $9, coupon_description = $10, version = version + 1, updated_at = $11
             WHERE id = $1 AND version = $12 RETURNING *",
        )
        .bind(cart.id)
        .bind(serde_json::to_value(&cart.items)?)
        .bind(cart.items_subtotal.amount())
        .bind(cart.items_discount.amount())
        .bind(cart.coupon_discount.amount())
        .bind(cart.total_discount.amount())
        .bind(cart.grand_total.amount())
        .bind(i32::try_from(cart.total_items).unwrap_or(i32::MAX))
        .bind(&cart.active_coupon_code)
        .bind(cart.coupon_snapshot.as_ref().map(|s| s.description.clone()))
        .bind(cart.updated_at)
        .bind(cart.version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(Error::StaleCart),
        }
    }

    async fn delete_guest(&self, guest_cart_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE guest_cart_id = $1")
            .bind(guest_cart_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Clone, Debug)]
pub struct PgOrders {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    status: String,
    coupon_code: Option<String>,
    items: serde_json::Value,
    totals: serde_json::Value,
    shipping_address: serde_json::Value,
    payment: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = Error;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Order {
            id: row.id,
            order_number: OrderNumber::parse(&row.order_number)
                .map_err(|e| Error::Storage(e.to_string()))?,
            customer_id: row.customer_id,
            status: OrderStatus::from_str(&row.status),
            coupon_code: row.coupon_code,
            items: serde_json::from_value(row.items)?,
            totals: serde_json::from_value(row.totals)?,
            shipping_address: serde_json::from_value(row.shipping_address)?,
            payment: serde_json::from_value(row.payment)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PgOrders {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, customer_id: Uuid, order_id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE id = $1 AND customer_id = $2",
        )
        .bind(order_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    pub async fn list(&self, customer_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }
}

impl Orders for PgOrders {
    async fn last_number_with_prefix(&self, prefix: &str) -> Result<Option<String>> {
        let number: Option<(String,)> = sqlx::query_as(
            "SELECT order_number FROM orders WHERE order_number LIKE $1
             ORDER BY order_number DESC LIMIT 1",
        )
        .bind(format!("{prefix}-%"))
        .fetch_optional(&self.pool)
        .await?;
        Ok(number.map(|n| n.0))
    }

    async fn create_with_cart_clear(&self, order: Order, cart_id: Uuid) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_id, status, coupon_code, items, totals, shipping_address, payment, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order.id)
        .bind(order.order_number.as_str())
        .bind(order.customer_id)
        .bind(order.status.as_str())
        .bind(&order.coupon_code)
        .bind(serde_json::to_value(&order.items)?)
        .bind(serde_json::to_value(&order.totals)?)
        .bind(serde_json::to_value(&order.shipping_address)?)
        .bind(serde_json::to_value(&order.payment)?)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE carts SET items = '[]'::jsonb, items_subtotal = 0, items_discount = 0, coupon_discount = 0, total_discount = 0, grand_total = 0, total_items = 0, active_coupon_code = NULL, coupon_description = NULL, version = version + 1, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }
}
