//! In-memory collaborator doubles used by the unit tests.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::aggregates::cart::{Cart, CartIdentifier, CartOwner};
use crate::domain::aggregates::coupon::Coupon;
use crate::domain::aggregates::order::Order;
use crate::domain::aggregates::product::{Product, ProductStatus};
use crate::store::{CartStore, Catalog, Coupons, Orders};
use crate::{Error, Result};

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    products: Arc<DashMap<Uuid, Product>>,
}

impl MemoryCatalog {
    /// Insert or replace a product.
    pub fn seed(&self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn remove(&self, id: Uuid) {
        self.products.remove(&id);
    }
}

impl Catalog for MemoryCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self
            .products
            .get(&id)
            .filter(|p| p.status == ProductStatus::Active)
            .map(|p| p.value().clone()))
    }
}

#[derive(Clone, Default)]
pub struct MemoryCoupons {
    coupons: Arc<DashMap<String, Coupon>>,
}

impl MemoryCoupons {
    pub fn seed(&self, coupon: Coupon) {
        self.coupons.insert(coupon.code.clone(), coupon);
    }

    pub fn remove(&self, code: &str) {
        self.coupons.remove(code);
    }
}

impl Coupons for MemoryCoupons {
    async fn by_code(&self, code: &str) -> Result<Option<Coupon>> {
        let code = code.trim().to_uppercase();
        Ok(self
            .coupons
            .get(&code)
            .filter(|c| c.is_redeemable(Utc::now()))
            .map(|c| c.value().clone()))
    }
}

#[derive(Clone, Default)]
pub struct MemoryCartStore {
    carts: Arc<DashMap<Uuid, Cart>>,
}

impl MemoryCartStore {
    pub(crate) fn clear_cart(&self, id: Uuid) {
        if let Some(mut cart) = self.carts.get_mut(&id) {
            cart.reset();
            cart.version += 1;
        }
    }
}

impl CartStore for MemoryCartStore {
    async fn find(&self, identifier: &CartIdentifier) -> Result<Option<Cart>> {
        if let Some(customer) = identifier.customer_id {
            return Ok(self
                .carts
                .iter()
                .find(|c| c.owner.customer_id() == Some(customer))
                .map(|c| c.value().clone()));
        }
        if let Some(guest) = identifier.guest_cart_id {
            return Ok(self
                .carts
                .iter()
                .find(|c| c.owner.guest_id() == Some(guest))
                .map(|c| c.value().clone()));
        }
        Ok(None)
    }

    async fn create(&self, owner: CartOwner) -> Result<Cart> {
        let cart = Cart::new(owner);
        self.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn save(&self, mut cart: Cart) -> Result<Cart> {
        let mut stored = self.carts.get_mut(&cart.id).ok_or(Error::CartNotFound)?;
        if stored.version != cart.version {
            return Err(Error::StaleCart);
        }
        cart.version += 1;
        *stored = cart.clone();
        Ok(cart)
    }

    async fn delete_guest(&self, guest_cart_id: Uuid) -> Result<()> {
        let id = self
            .carts
            .iter()
            .find(|c| c.owner.guest_id() == Some(guest_cart_id))
            .map(|c| c.id);
        if let Some(id) = id {
            self.carts.remove(&id);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MemoryOrders {
    orders: Arc<DashMap<Uuid, Order>>,
    carts: MemoryCartStore,
}

impl MemoryOrders {
    pub fn new(carts: MemoryCartStore) -> Self {
        Self { orders: Arc::default(), carts }
    }

    pub fn all(&self) -> Vec<Order> {
        self.orders.iter().map(|o| o.value().clone()).collect()
    }
}

impl Orders for MemoryOrders {
    async fn last_number_with_prefix(&self, prefix: &str) -> Result<Option<String>> {
        let prefix = format!("{prefix}-");
        Ok(self
            .orders
            .iter()
            .map(|o| o.order_number.as_str().to_string())
            .filter(|n| n.starts_with(&prefix))
            .max())
    }

    async fn create_with_cart_clear(&self, order: Order, cart_id: Uuid) -> Result<Order> {
        self.carts.clear_cart(cart_id);
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }
}
