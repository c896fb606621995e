//! Cart Aggregate
//!
//! One cart per owner. All summary fields (`items_subtotal`, `items_discount`,
//! `total_discount`, `grand_total`, `total_items`) are derived; mutations must
//! be followed by an explicit [`Cart::recompute_totals`] before the cart is
//! persisted, which keeps the invariant-preserving step visible and testable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::coupon::Coupon;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Money;

/// The identity a cart is keyed by: a registered customer or a guest session,
/// never both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartOwner {
    Customer(Uuid),
    Guest(Uuid),
}

impl CartOwner {
    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            CartOwner::Customer(id) => Some(*id),
            CartOwner::Guest(_) => None,
        }
    }

    pub fn guest_id(&self) -> Option<Uuid> {
        match self {
            CartOwner::Customer(_) => None,
            CartOwner::Guest(id) => Some(*id),
        }
    }
}

/// How a request refers to a cart. Both ids may be absent (a brand-new guest)
/// and, when both are present, the customer id wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CartIdentifier {
    pub customer_id: Option<Uuid>,
    pub guest_cart_id: Option<Uuid>,
}

impl CartIdentifier {
    pub fn customer(id: Uuid) -> Self {
        Self { customer_id: Some(id), ..Self::default() }
    }

    pub fn guest(id: Uuid) -> Self {
        Self { guest_cart_id: Some(id), ..Self::default() }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// One line of a cart.
///
/// `name`, `image_url` and the price fields are a display snapshot captured at
/// add-time; they are not re-synced when the catalog changes afterward.
/// `unit_price` is the frozen effective price actually charged per unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub list_price: Money,
    /// Present only when a promotion was active at add-time.
    pub promotional_price: Option<Money>,
    pub unit_price: Money,
    pub line_total: Money,
}

impl CartItem {
    /// Snapshot a catalog product into a new line, freezing its prices.
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        let unit_price = product.unit_price();
        Self {
            product_id: product.id,
            name: product.name.clone(),
            image_url: product.main_image_url.clone(),
            quantity,
            list_price: product.list_price,
            promotional_price: product.active_promotional_price(),
            unit_price,
            line_total: unit_price.times(quantity),
        }
    }
}

/// Descriptive mirror of the applied coupon, cleared together with
/// `active_coupon_code`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouponSnapshot {
    pub code: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub owner: CartOwner,
    pub items: Vec<CartItem>,
    pub items_subtotal: Money,
    pub items_discount: Money,
    pub coupon_discount: Money,
    pub total_discount: Money,
    pub grand_total: Money,
    pub total_items: u32,
    pub active_coupon_code: Option<String>,
    pub coupon_snapshot: Option<CouponSnapshot>,
    /// Optimistic-concurrency token; bumped by the store on every save.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner,
            items: vec![],
            items_subtotal: Money::ZERO,
            items_discount: Money::ZERO,
            coupon_discount: Money::ZERO,
            total_discount: Money::ZERO,
            grand_total: Money::ZERO,
            total_items: 0,
            active_coupon_code: None,
            coupon_snapshot: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line(&self, product_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: Uuid) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|i| i.product_id == product_id)
    }

    /// Quantity currently carried for a product, `0` when there is no line.
    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.line(product_id).map_or(0, |i| i.quantity)
    }

    /// Post-promotion, pre-coupon total of the current items; the amount a
    /// coupon's minimum purchase threshold is tested against.
    pub fn eligible_subtotal(&self) -> Money {
        self.items.iter().map(|i| i.line_total).sum()
    }

    /// Merge `quantity` units of a product into the cart.
    ///
    /// An existing line keeps its frozen `unit_price`; only a brand-new line
    /// snapshots current catalog prices.
    pub fn add_item(&mut self, product: &Product, quantity: u32) {
        match self.line_mut(product.id) {
            Some(line) => {
                line.quantity += quantity;
                line.line_total = line.unit_price.times(line.quantity);
            }
            None => self.items.push(CartItem::from_product(product, quantity)),
        }
    }

    /// Set the quantity of an existing line, keeping its frozen unit price.
    pub fn set_item_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let line = self.line_mut(product_id).ok_or(CartError::ItemNotFound)?;
        line.quantity = quantity;
        line.line_total = line.unit_price.times(quantity);
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before {
            return Err(CartError::ItemNotFound);
        }
        Ok(())
    }

    /// Fold another cart's lines into this one.
    ///
    /// On a product conflict the quantities are added and *this* cart's frozen
    /// unit price wins; otherwise the line is carried over verbatim, price
    /// snapshot included.
    pub fn merge_from(&mut self, other: &Cart) {
        for item in &other.items {
            match self.line_mut(item.product_id) {
                Some(line) => {
                    line.quantity += item.quantity;
                    line.line_total = line.unit_price.times(line.quantity);
                }
                None => self.items.push(item.clone()),
            }
        }
    }

    /// Attach a coupon and compute its discount against the current items.
    pub fn apply_coupon(&mut self, coupon: &Coupon) {
        self.active_coupon_code = Some(coupon.code.clone());
        self.coupon_snapshot = Some(CouponSnapshot {
            code: coupon.code.clone(),
            description: coupon.description.clone(),
        });
        self.coupon_discount = coupon.discount_for(self.eligible_subtotal());
    }

    /// Detach any active coupon. Safe to call when none is active.
    pub fn clear_coupon(&mut self) {
        self.active_coupon_code = None;
        self.coupon_snapshot = None;
        self.coupon_discount = Money::ZERO;
    }

    /// Empty the cart entirely: lines, coupon and summary.
    pub fn reset(&mut self) {
        self.items.clear();
        self.clear_coupon();
        self.recompute_totals();
    }

    /// Recompute every derived field from the items and the coupon discount.
    ///
    /// Always the final step of a mutation, immediately before persistence.
    pub fn recompute_totals(&mut self) {
        let mut subtotal = Money::ZERO;
        let mut items_discount = Money::ZERO;
        let mut count = 0u32;
        for item in &self.items {
            subtotal += item.list_price.times(item.quantity);
            if let Some(promotional) = item.promotional_price {
                items_discount += (item.list_price - promotional).times(item.quantity);
            }
            count += item.quantity;
        }
        self.items_subtotal = subtotal;
        self.items_discount = items_discount;
        if self.active_coupon_code.is_none() {
            self.coupon_discount = Money::ZERO;
            self.coupon_snapshot = None;
        }
        self.total_discount = self.items_discount + self.coupon_discount;
        self.grand_total = self.items_subtotal - self.total_discount;
        self.total_items = count;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Product is not in the cart")
    }
}

impl From<CartError> for crate::Error {
    fn from(_: CartError) -> Self {
        crate::Error::ItemNotFound
    }
}
