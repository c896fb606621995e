//! Cart Pricing & Coupon Engine
//!
//! Applies a single mutation to a cart and hands back a fully recomputed,
//! invariant-satisfying snapshot. Every mutating operation follows the same
//! shape: resolve the cart, mutate its lines, re-check any applied coupon,
//! recompute the derived summary, persist. Errors abort before persistence,
//! so a failed operation leaves the stored cart untouched.

use uuid::Uuid;

use crate::domain::aggregates::cart::{Cart, CartIdentifier, CartOwner};
use crate::service::{revalidate_coupon, CouponNotice};
use crate::store::{CartStore, Catalog, Coupons};
use crate::{Error, Result};

/// Outcome of a cart operation.
///
/// `new_guest_cart_id` is set when the operation had to mint a guest identity;
/// the client is expected to remember it. `coupon_notice` is the advisory
/// "coupon dropped" side channel.
#[derive(Clone, Debug)]
pub struct CartMutation {
    pub cart: Cart,
    pub new_guest_cart_id: Option<Uuid>,
    pub coupon_notice: Option<CouponNotice>,
}

impl CartMutation {
    fn new(cart: Cart, new_guest_cart_id: Option<Uuid>, coupon_notice: Option<CouponNotice>) -> Self {
        Self { cart, new_guest_cart_id, coupon_notice }
    }
}

#[derive(Clone, Debug)]
pub struct CartService<C, K, S> {
    catalog: C,
    coupons: K,
    carts: S,
}

impl<C: Catalog, K: Coupons, S: CartStore> CartService<C, K, S> {
    pub fn new(catalog: C, coupons: K, carts: S) -> Self {
        Self { catalog, coupons, carts }
    }

    /// Resolve the owner's cart, creating an empty one on demand.
    ///
    /// A guest identifier that matches nothing gets a *fresh* id rather than
    /// adopting the client's value; the new id is returned so the client can
    /// store it.
    async fn resolve_or_create(&self, identifier: &CartIdentifier) -> Result<(Cart, Option<Uuid>)> {
        if let Some(cart) = self.carts.find(identifier).await? {
            return Ok((cart, None));
        }
        if let Some(customer) = identifier.customer_id {
            let cart = self.carts.create(CartOwner::Customer(customer)).await?;
            Ok((cart, None))
        } else {
            let guest_id = Uuid::new_v4();
            let cart = self.carts.create(CartOwner::Guest(guest_id)).await?;
            Ok((cart, Some(guest_id)))
        }
    }

    pub async fn get_cart(&self, identifier: &CartIdentifier) -> Result<CartMutation> {
        let (cart, new_guest_cart_id) = self.resolve_or_create(identifier).await?;
        Ok(CartMutation::new(cart, new_guest_cart_id, None))
    }

    /// Add `quantity` units of a product, merging into an existing line.
    ///
    /// A merged line keeps its frozen unit price; the catalog is only
    /// consulted for existence and stock.
    pub async fn add_item(
        &self,
        identifier: &CartIdentifier,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<CartMutation> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity);
        }
        let product = self.catalog.product(product_id).await?.ok_or(Error::ProductNotFound)?;
        let (mut cart, new_guest_cart_id) = self.resolve_or_create(identifier).await?;

        let new_quantity = cart.quantity_of(product_id) + quantity;
        if new_quantity > product.stock_quantity {
            return Err(Error::InsufficientStock);
        }
        cart.add_item(&product, quantity);

        let coupon_notice = revalidate_coupon(&self.coupons, &mut cart).await?;
        cart.recompute_totals();
        let cart = self.carts.save(cart).await?;
        Ok(CartMutation::new(cart, new_guest_cart_id, coupon_notice))
    }

    /// Set the quantity of an existing line. The line's unit price stays
    /// frozen; only existence and stock are re-checked against the catalog.
    pub async fn update_item_quantity(
        &self,
        identifier: &CartIdentifier,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<CartMutation> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity);
        }
        let (mut cart, new_guest_cart_id) = self.resolve_or_create(identifier).await?;
        if cart.line(product_id).is_none() {
            return Err(Error::ItemNotFound);
        }
        let product = self.catalog.product(product_id).await?.ok_or(Error::ProductNotFound)?;
        if quantity > product.stock_quantity {
            return Err(Error::InsufficientStock);
        }
        cart.set_item_quantity(product_id, quantity)?;

        let coupon_notice = revalidate_coupon(&self.coupons, &mut cart).await?;
        cart.recompute_totals();
        let cart = self.carts.save(cart).await?;
        Ok(CartMutation::new(cart, new_guest_cart_id, coupon_notice))
    }

    pub async fn remove_item(
        &self,
        identifier: &CartIdentifier,
        product_id: Uuid,
    ) -> Result<CartMutation> {
        let (mut cart, new_guest_cart_id) = self.resolve_or_create(identifier).await?;
        cart.remove_item(product_id)?;

        let coupon_notice = revalidate_coupon(&self.coupons, &mut cart).await?;
        cart.recompute_totals();
        let cart = self.carts.save(cart).await?;
        Ok(CartMutation::new(cart, new_guest_cart_id, coupon_notice))
    }

    /// Apply a coupon to the cart's current contents.
    ///
    /// The minimum purchase threshold is tested against the eligible
    /// subtotal (post-promotion, pre-coupon) and is inclusive.
    pub async fn apply_coupon(&self, identifier: &CartIdentifier, code: &str) -> Result<CartMutation> {
        let (mut cart, new_guest_cart_id) = self.resolve_or_create(identifier).await?;
        let code = code.trim().to_uppercase();
        let coupon = self.coupons.by_code(&code).await?.ok_or(Error::CouponNotFound)?;

        let eligible = cart.eligible_subtotal();
        if eligible < coupon.min_purchase_value {
            return Err(Error::MinPurchaseNotMet { minimum: coupon.min_purchase_value });
        }
        cart.apply_coupon(&coupon);
        cart.recompute_totals();
        let cart = self.carts.save(cart).await?;
        Ok(CartMutation::new(cart, new_guest_cart_id, None))
    }

    /// Detach any active coupon. Idempotent: succeeds with unchanged totals
    /// when no coupon is applied.
    pub async fn remove_coupon(&self, identifier: &CartIdentifier) -> Result<CartMutation> {
        let (mut cart, new_guest_cart_id) = self.resolve_or_create(identifier).await?;
        cart.clear_coupon();
        cart.recompute_totals();
        let cart = self.carts.save(cart).await?;
        Ok(CartMutation::new(cart, new_guest_cart_id, None))
    }

    /// Fold a guest cart into the customer's cart and delete the guest cart.
    ///
    /// A missing or empty guest cart is not an error; the customer's cart is
    /// returned unchanged (created if necessary). On a line conflict the
    /// customer cart's frozen unit price wins. Unlike add/update, a merge does
    /// not re-validate stock; checkout is the backstop.
    pub async fn merge_carts(&self, customer_id: Uuid, guest_cart_id: Uuid) -> Result<CartMutation> {
        let identifier = CartIdentifier::customer(customer_id);
        let guest = self.carts.find(&CartIdentifier::guest(guest_cart_id)).await?;
        let guest = match guest {
            Some(cart) if !cart.is_empty() => cart,
            _ => {
                let (cart, _) = self.resolve_or_create(&identifier).await?;
                return Ok(CartMutation::new(cart, None, None));
            }
        };

        let (mut cart, _) = self.resolve_or_create(&identifier).await?;
        cart.merge_from(&guest);

        let coupon_notice = revalidate_coupon(&self.coupons, &mut cart).await?;
        cart.recompute_totals();
        let cart = self.carts.save(cart).await?;
        self.carts.delete_guest(guest_cart_id).await?;
        Ok(CartMutation::new(cart, None, coupon_notice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::tests::coupon;
    use crate::domain::aggregates::coupon::CouponKind;
    use crate::domain::aggregates::product::tests::product;
    use crate::domain::value_objects::Money;
    use crate::store::memory::{MemoryCartStore, MemoryCatalog, MemoryCoupons};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    type Service = CartService<MemoryCatalog, MemoryCoupons, MemoryCartStore>;

    fn service() -> (Service, MemoryCatalog, MemoryCoupons, MemoryCartStore) {
        let catalog = MemoryCatalog::default();
        let coupons = MemoryCoupons::default();
        let carts = MemoryCartStore::default();
        let service = CartService::new(catalog.clone(), coupons.clone(), carts.clone());
        (service, catalog, coupons, carts)
    }

    fn money(v: i64) -> Money {
        Money::new(Decimal::new(v, 0))
    }

    #[tokio::test]
    async fn add_item_snapshots_promotion_and_recomputes() {
        let (service, catalog, _, _) = service();
        let p = product("Keyboard", 100, Some(90), 10);
        catalog.seed(p.clone());

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 2).await.unwrap();

        let line = m.cart.line(p.id).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price, money(90));
        assert_eq!(line.line_total, money(180));
        assert_eq!(m.cart.items_subtotal, money(200));
        assert_eq!(m.cart.items_discount, money(20));
        assert_eq!(m.cart.grand_total, money(180));
        assert!(m.new_guest_cart_id.is_some());
        assert!(m.coupon_notice.is_none());
    }

    #[tokio::test]
    async fn frozen_unit_price_survives_quantity_change() {
        let (service, catalog, _, _) = service();
        let mut p = product("Keyboard", 100, Some(90), 10);
        catalog.seed(p.clone());

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 2).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());

        // catalog price changes after the line was added
        p.promotional_price = Some(money(50));
        p.list_price = money(70);
        catalog.seed(p.clone());

        let m = service.add_item(&guest, p.id, 1).await.unwrap();
        assert_eq!(m.cart.line(p.id).unwrap().unit_price, money(90));
        assert_eq!(m.cart.line(p.id).unwrap().line_total, money(270));

        let m = service.update_item_quantity(&guest, p.id, 5).await.unwrap();
        assert_eq!(m.cart.line(p.id).unwrap().unit_price, money(90));
        assert_eq!(m.cart.line(p.id).unwrap().line_total, money(450));
    }

    #[tokio::test]
    async fn add_item_rejects_insufficient_stock() {
        let (service, catalog, _, _) = service();
        let p = product("Rare", 100, None, 3);
        catalog.seed(p.clone());

        let err = service.add_item(&CartIdentifier::anonymous(), p.id, 5).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientStock));

        // a failed merge into an existing line leaves the cart untouched
        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 2).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());
        let err = service.add_item(&guest, p.id, 2).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientStock));
        let m = service.get_cart(&guest).await.unwrap();
        assert_eq!(m.cart.line(p.id).unwrap().quantity, 2);
        assert_eq!(m.cart.grand_total, money(200));
    }

    #[tokio::test]
    async fn stock_boundary_is_inclusive() {
        let (service, catalog, _, _) = service();
        let p = product("Limited", 40, None, 10);
        catalog.seed(p.clone());

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 10).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());
        assert_eq!(m.cart.total_items, 10);

        let err = service.add_item(&guest, p.id, 1).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientStock));
    }

    #[tokio::test]
    async fn add_item_unknown_product_fails() {
        let (service, _, _, _) = service();
        let err = service.add_item(&CartIdentifier::anonymous(), Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, Error::ProductNotFound));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let (service, catalog, _, _) = service();
        let p = product("Thing", 10, None, 10);
        catalog.seed(p.clone());

        assert!(matches!(
            service.add_item(&CartIdentifier::anonymous(), p.id, 0).await.unwrap_err(),
            Error::InvalidQuantity
        ));
        assert!(matches!(
            service
                .update_item_quantity(&CartIdentifier::anonymous(), p.id, 0)
                .await
                .unwrap_err(),
            Error::InvalidQuantity
        ));
    }

    #[tokio::test]
    async fn percentage_coupon_discounts_eligible_subtotal() {
        let (service, catalog, coupons, _) = service();
        let p = product("Keyboard", 100, Some(90), 10);
        catalog.seed(p.clone());
        coupons.seed(coupon("SAVE10", CouponKind::Percentage, 10, 50));

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 2).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());

        let m = service.apply_coupon(&guest, "save10").await.unwrap();
        assert_eq!(m.cart.active_coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(m.cart.coupon_discount, money(18));
        assert_eq!(m.cart.total_discount, money(38));
        assert_eq!(m.cart.grand_total, money(162));
    }

    #[tokio::test]
    async fn fixed_coupon_never_discounts_below_zero() {
        let (service, catalog, coupons, _) = service();
        let p = product("Sticker", 30, None, 10);
        catalog.seed(p.clone());
        coupons.seed(coupon("FLAT50", CouponKind::Fixed, 50, 0));

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());

        let m = service.apply_coupon(&guest, "FLAT50").await.unwrap();
        assert_eq!(m.cart.coupon_discount, money(30));
        assert_eq!(m.cart.grand_total, Money::ZERO);
    }

    #[tokio::test]
    async fn coupon_minimum_is_inclusive() {
        let (service, catalog, coupons, _) = service();
        let p = product("Gadget", 499, None, 10);
        catalog.seed(p.clone());
        coupons.seed(coupon("BIG20", CouponKind::Fixed, 20, 500));

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());

        let err = service.apply_coupon(&guest, "BIG20").await.unwrap_err();
        match err {
            Error::MinPurchaseNotMet { minimum } => assert_eq!(minimum, money(500)),
            other => panic!("unexpected error: {other:?}"),
        }
        let m = service.get_cart(&guest).await.unwrap();
        assert!(m.cart.active_coupon_code.is_none());

        // exactly at the threshold is accepted
        coupons.seed(coupon("EXACT", CouponKind::Fixed, 20, 499));
        let m = service.apply_coupon(&guest, "EXACT").await.unwrap();
        assert_eq!(m.cart.coupon_discount, money(20));
    }

    #[tokio::test]
    async fn inactive_or_expired_coupons_are_not_found() {
        let (service, catalog, coupons, _) = service();
        let p = product("Gadget", 100, None, 10);
        catalog.seed(p.clone());
        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());

        let mut inactive = coupon("OFF", CouponKind::Fixed, 5, 0);
        inactive.is_active = false;
        coupons.seed(inactive);
        let mut expired = coupon("OLD", CouponKind::Fixed, 5, 0);
        expired.expires_at = Utc::now() - Duration::days(1);
        coupons.seed(expired);

        assert!(matches!(service.apply_coupon(&guest, "OFF").await.unwrap_err(), Error::CouponNotFound));
        assert!(matches!(service.apply_coupon(&guest, "OLD").await.unwrap_err(), Error::CouponNotFound));
        assert!(matches!(service.apply_coupon(&guest, "NOPE").await.unwrap_err(), Error::CouponNotFound));
    }

    #[tokio::test]
    async fn item_mutation_drops_ineligible_coupon_with_notice() {
        let (service, catalog, coupons, _) = service();
        let p = product("Keyboard", 100, Some(90), 10);
        catalog.seed(p.clone());
        coupons.seed(coupon("SAVE10", CouponKind::Percentage, 10, 50));

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 2).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());
        service.apply_coupon(&guest, "SAVE10").await.unwrap();

        // removing the only line leaves the subtotal below the minimum
        let m = service.remove_item(&guest, p.id).await.unwrap();
        assert!(m.cart.is_empty());
        assert!(m.cart.active_coupon_code.is_none());
        assert!(m.cart.coupon_snapshot.is_none());
        assert_eq!(m.cart.coupon_discount, Money::ZERO);
        assert_eq!(m.cart.grand_total, Money::ZERO);

        let notice = m.coupon_notice.unwrap();
        assert_eq!(notice.status, "REMOVED");
        assert_eq!(notice.code, "SAVE10");
    }

    #[tokio::test]
    async fn revalidation_picks_up_retuned_coupon_value() {
        let (service, catalog, coupons, _) = service();
        let p = product("Keyboard", 100, None, 10);
        catalog.seed(p.clone());
        coupons.seed(coupon("SAVE10", CouponKind::Percentage, 10, 0));

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());
        service.apply_coupon(&guest, "SAVE10").await.unwrap();

        // the merchant doubles the discount while the coupon sits in the cart
        coupons.seed(coupon("SAVE10", CouponKind::Percentage, 20, 0));

        let m = service.add_item(&guest, p.id, 1).await.unwrap();
        assert_eq!(m.cart.coupon_discount, money(40));
        assert!(m.coupon_notice.is_none());
    }

    #[tokio::test]
    async fn coupon_deleted_behind_the_cart_is_dropped_on_mutation() {
        let (service, catalog, coupons, _) = service();
        let p = product("Keyboard", 100, None, 10);
        catalog.seed(p.clone());
        coupons.seed(coupon("SAVE10", CouponKind::Percentage, 10, 0));

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());
        service.apply_coupon(&guest, "SAVE10").await.unwrap();

        coupons.remove("SAVE10");

        let m = service.update_item_quantity(&guest, p.id, 2).await.unwrap();
        assert!(m.cart.active_coupon_code.is_none());
        assert!(m.coupon_notice.is_some());
        assert_eq!(m.cart.grand_total, money(200));
    }

    #[tokio::test]
    async fn remove_coupon_is_idempotent() {
        let (service, catalog, coupons, _) = service();
        let p = product("Keyboard", 100, None, 10);
        catalog.seed(p.clone());
        coupons.seed(coupon("SAVE10", CouponKind::Percentage, 10, 0));

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());
        service.apply_coupon(&guest, "SAVE10").await.unwrap();

        let first = service.remove_coupon(&guest).await.unwrap();
        assert!(first.cart.active_coupon_code.is_none());
        assert_eq!(first.cart.grand_total, money(100));

        let second = service.remove_coupon(&guest).await.unwrap();
        assert!(second.cart.active_coupon_code.is_none());
        assert_eq!(second.cart.grand_total, first.cart.grand_total);
        assert_eq!(second.cart.total_discount, first.cart.total_discount);
    }

    #[tokio::test]
    async fn update_quantity_missing_line_or_product() {
        let (service, catalog, _, _) = service();
        let p = product("Keyboard", 100, None, 10);
        catalog.seed(p.clone());

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());

        assert!(matches!(
            service.update_item_quantity(&guest, Uuid::new_v4(), 2).await.unwrap_err(),
            Error::ItemNotFound
        ));

        // product vanished from the catalog after being added to the cart
        catalog.remove(p.id);
        assert!(matches!(
            service.update_item_quantity(&guest, p.id, 2).await.unwrap_err(),
            Error::ProductNotFound
        ));
    }

    #[tokio::test]
    async fn remove_item_missing_line_fails() {
        let (service, _, _, _) = service();
        let err = service
            .remove_item(&CartIdentifier::anonymous(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ItemNotFound));
    }

    #[tokio::test]
    async fn merge_prefers_customer_frozen_price_and_deletes_guest() {
        let (service, catalog, _, carts) = service();
        let customer = Uuid::new_v4();

        let p = product("Mouse", 60, None, 10);
        catalog.seed(p.clone());
        service.add_item(&CartIdentifier::customer(customer), p.id, 1).await.unwrap();

        // the guest added the same product when it sold for 50
        let mut older = p.clone();
        older.list_price = money(50);
        catalog.seed(older);
        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest_id = m.new_guest_cart_id.unwrap();
        catalog.seed(p.clone());

        let m = service.merge_carts(customer, guest_id).await.unwrap();
        let line = m.cart.line(p.id).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price, money(60));
        assert_eq!(line.line_total, money(120));
        assert_eq!(m.cart.grand_total, money(120));

        let gone = carts.find(&CartIdentifier::guest(guest_id)).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn merge_carries_new_guest_lines_verbatim() {
        let (service, catalog, _, _) = service();
        let customer = Uuid::new_v4();

        let keyboard = product("Keyboard", 100, Some(90), 10);
        let mouse = product("Mouse", 60, None, 10);
        catalog.seed(keyboard.clone());
        catalog.seed(mouse.clone());

        service.add_item(&CartIdentifier::customer(customer), keyboard.id, 1).await.unwrap();
        let m = service.add_item(&CartIdentifier::anonymous(), mouse.id, 2).await.unwrap();
        let guest_id = m.new_guest_cart_id.unwrap();

        let m = service.merge_carts(customer, guest_id).await.unwrap();
        assert_eq!(m.cart.items.len(), 2);
        assert_eq!(m.cart.line(mouse.id).unwrap().quantity, 2);
        assert_eq!(m.cart.line(mouse.id).unwrap().unit_price, money(60));
        assert_eq!(m.cart.grand_total, money(210));
        assert_eq!(m.cart.total_items, 3);
    }

    #[tokio::test]
    async fn merge_missing_or_empty_guest_is_a_noop() {
        let (service, catalog, _, _) = service();
        let customer = Uuid::new_v4();
        let p = product("Keyboard", 100, None, 10);
        catalog.seed(p.clone());
        service.add_item(&CartIdentifier::customer(customer), p.id, 1).await.unwrap();

        let m = service.merge_carts(customer, Uuid::new_v4()).await.unwrap();
        assert_eq!(m.cart.total_items, 1);
        assert_eq!(m.cart.grand_total, money(100));

        // an existing but empty guest cart behaves the same
        let empty = service.get_cart(&CartIdentifier::anonymous()).await.unwrap();
        let m = service.merge_carts(customer, empty.new_guest_cart_id.unwrap()).await.unwrap();
        assert_eq!(m.cart.total_items, 1);
    }

    #[tokio::test]
    async fn merge_does_not_revalidate_stock() {
        // Merging may push a line past the available stock; locked in here so
        // the behavior is explicit rather than accidental.
        let (service, catalog, _, _) = service();
        let customer = Uuid::new_v4();
        let p = product("Scarce", 100, None, 3);
        catalog.seed(p.clone());

        service.add_item(&CartIdentifier::customer(customer), p.id, 2).await.unwrap();
        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 2).await.unwrap();
        let guest_id = m.new_guest_cart_id.unwrap();

        let m = service.merge_carts(customer, guest_id).await.unwrap();
        assert_eq!(m.cart.line(p.id).unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn stale_guest_id_gets_a_fresh_cart() {
        let (service, catalog, _, _) = service();
        let p = product("Keyboard", 100, None, 10);
        catalog.seed(p.clone());

        let stale = Uuid::new_v4();
        let m = service.add_item(&CartIdentifier::guest(stale), p.id, 1).await.unwrap();
        let fresh = m.new_guest_cart_id.unwrap();
        assert_ne!(fresh, stale);

        // the fresh id now resolves to the same cart without minting again
        let m = service.get_cart(&CartIdentifier::guest(fresh)).await.unwrap();
        assert!(m.new_guest_cart_id.is_none());
        assert_eq!(m.cart.total_items, 1);
    }

    #[tokio::test]
    async fn customer_identity_wins_over_guest_header() {
        let (service, catalog, _, _) = service();
        let customer = Uuid::new_v4();
        let p = product("Keyboard", 100, None, 10);
        catalog.seed(p.clone());

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest_id = m.new_guest_cart_id.unwrap();

        let both = CartIdentifier { customer_id: Some(customer), guest_cart_id: Some(guest_id) };
        let m = service.get_cart(&both).await.unwrap();
        assert_eq!(m.cart.owner, CartOwner::Customer(customer));
        assert!(m.cart.is_empty());
    }

    #[tokio::test]
    async fn concurrent_saves_conflict_on_version() {
        let (service, catalog, _, carts) = service();
        let p = product("Keyboard", 100, None, 10);
        catalog.seed(p.clone());

        let m = service.add_item(&CartIdentifier::anonymous(), p.id, 1).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());

        // two requests load the same snapshot; the slower save must lose
        let first = carts.find(&guest).await.unwrap().unwrap();
        let second = first.clone();

        carts.save(first).await.unwrap();
        let err = carts.save(second).await.unwrap_err();
        assert!(matches!(err, Error::StaleCart));

        // the engine re-reads per operation, so a retry goes through
        let m = service.add_item(&guest, p.id, 1).await.unwrap();
        assert_eq!(m.cart.total_items, 2);
    }

    #[tokio::test]
    async fn totals_invariants_hold_across_operations() {
        let (service, catalog, coupons, _) = service();
        let keyboard = product("Keyboard", 100, Some(90), 10);
        let mouse = product("Mouse", 60, None, 10);
        catalog.seed(keyboard.clone());
        catalog.seed(mouse.clone());
        coupons.seed(coupon("SAVE10", CouponKind::Percentage, 10, 50));

        let m = service.add_item(&CartIdentifier::anonymous(), keyboard.id, 2).await.unwrap();
        let guest = CartIdentifier::guest(m.new_guest_cart_id.unwrap());
        service.add_item(&guest, mouse.id, 1).await.unwrap();
        service.apply_coupon(&guest, "SAVE10").await.unwrap();
        let m = service.update_item_quantity(&guest, keyboard.id, 3).await.unwrap();

        let cart = &m.cart;
        assert_eq!(cart.total_discount, cart.items_discount + cart.coupon_discount);
        assert_eq!(cart.grand_total, cart.items_subtotal - cart.total_discount);
        for line in &cart.items {
            assert_eq!(line.line_total, line.unit_price.times(line.quantity));
        }
        let line_count: u32 = cart.items.iter().map(|i| i.quantity).sum();
        assert_eq!(cart.total_items, line_count);
    }
}
