//! In-memory store implementation for tests and the dev server.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use common::{CartId, CheckoutId, ListingId, OrderId, ProductId, SellerId, UserId};

use crate::error::{Result, StoreError};
use crate::records::{
    Cart, CartLine, CheckoutRecord, CheckoutState, Listing, Order, OrderLine, Product, Seller,
};
use crate::traits::{Catalog, CartStore, CheckoutJournal, OrderStore, StockLedger};

#[derive(Debug)]
struct CartEntry {
    id: CartId,
    // BTreeMap keeps lines() ordered by listing id without a sort.
    lines: BTreeMap<ListingId, u32>,
}

/// In-memory marketplace store.
///
/// Each listing lives in its own mutex cell so that reservations on
/// different listings never contend; the outer map lock is only held long
/// enough to find the cell.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    sellers: Arc<RwLock<HashMap<SellerId, Seller>>>,
    listings: Arc<RwLock<HashMap<ListingId, Arc<Mutex<Listing>>>>>,
    carts: Arc<RwLock<HashMap<UserId, CartEntry>>>,
    orders: Arc<RwLock<HashMap<OrderId, (Order, Vec<OrderLine>)>>>,
    checkouts: Arc<RwLock<HashMap<CheckoutId, CheckoutRecord>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    // Catalog mutation happens outside the core; these are the outside.

    /// Registers a product.
    pub fn add_product(&self, product: Product) {
        self.products
            .write()
            .unwrap()
            .insert(product.id, product);
    }

    /// Registers a seller.
    pub fn add_seller(&self, seller: Seller) {
        self.sellers.write().unwrap().insert(seller.id, seller);
    }

    /// Registers a listing.
    pub fn add_listing(&self, listing: Listing) {
        self.listings
            .write()
            .unwrap()
            .insert(listing.id, Arc::new(Mutex::new(listing)));
    }

    /// Activates or deactivates a listing.
    pub fn set_listing_active(&self, listing_id: ListingId, active: bool) -> Result<()> {
        let cell = self.listing_cell(listing_id)?;
        cell.lock().unwrap().active = active;
        Ok(())
    }

    /// Current stock of a listing, for assertions in tests.
    pub fn stock_of(&self, listing_id: ListingId) -> Result<u32> {
        Ok(self.listing_cell(listing_id)?.lock().unwrap().stock)
    }

    fn listing_cell(&self, listing_id: ListingId) -> Result<Arc<Mutex<Listing>>> {
        self.listings
            .read()
            .unwrap()
            .get(&listing_id)
            .cloned()
            .ok_or(StoreError::ListingNotFound(listing_id))
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>> {
        let cell = { self.listings.read().unwrap().get(&id).cloned() };
        Ok(cell.map(|c| c.lock().unwrap().clone()))
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().unwrap().get(&id).cloned())
    }

    async fn seller(&self, id: SellerId) -> Result<Option<Seller>> {
        Ok(self.sellers.read().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl StockLedger for InMemoryStore {
    async fn reserve(&self, listing_id: ListingId, quantity: u32) -> Result<()> {
        let cell = self.listing_cell(listing_id)?;
        let mut listing = cell.lock().unwrap();

        let available = if listing.active { listing.stock } else { 0 };
        if available < quantity {
            tracing::debug!(%listing_id, requested = quantity, available, "reservation refused");
            return Err(StoreError::InsufficientStock {
                listing_id,
                requested: quantity,
                available,
            });
        }

        listing.stock -= quantity;
        Ok(())
    }

    async fn release(&self, listing_id: ListingId, quantity: u32) -> Result<()> {
        let cell = self.listing_cell(listing_id)?;
        let mut listing = cell.lock().unwrap();
        listing.stock = listing.stock.saturating_add(quantity);
        Ok(())
    }

    async fn max_allowed(&self, listing_id: ListingId) -> Result<u32> {
        let (stock, active, product_id) = {
            let cell = self.listing_cell(listing_id)?;
            let listing = cell.lock().unwrap();
            (listing.stock, listing.active, listing.product_id)
        };

        if !active {
            return Ok(0);
        }

        let max_buy = self
            .products
            .read()
            .unwrap()
            .get(&product_id)
            .and_then(|p| p.max_buy);

        Ok(match max_buy {
            Some(cap) => stock.min(cap),
            None => stock,
        })
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn cart_for_user(&self, user_id: UserId) -> Result<Cart> {
        let mut carts = self.carts.write().unwrap();
        let entry = carts.entry(user_id).or_insert_with(|| CartEntry {
            id: CartId::new(),
            lines: BTreeMap::new(),
        });
        Ok(Cart {
            id: entry.id,
            user_id,
        })
    }

    async fn line(&self, user_id: UserId, listing_id: ListingId) -> Result<Option<CartLine>> {
        let carts = self.carts.read().unwrap();
        Ok(carts.get(&user_id).and_then(|entry| {
            entry.lines.get(&listing_id).map(|&quantity| CartLine {
                cart_id: entry.id,
                listing_id,
                quantity,
            })
        }))
    }

    async fn put_line(
        &self,
        user_id: UserId,
        listing_id: ListingId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut carts = self.carts.write().unwrap();
        let entry = carts.entry(user_id).or_insert_with(|| CartEntry {
            id: CartId::new(),
            lines: BTreeMap::new(),
        });
        entry.lines.insert(listing_id, quantity);
        Ok(CartLine {
            cart_id: entry.id,
            listing_id,
            quantity,
        })
    }

    async fn remove_line(&self, user_id: UserId, listing_id: ListingId) -> Result<()> {
        let mut carts = self.carts.write().unwrap();
        let removed = carts
            .get_mut(&user_id)
            .and_then(|entry| entry.lines.remove(&listing_id));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::LineNotFound(listing_id)),
        }
    }

    async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let carts = self.carts.read().unwrap();
        Ok(carts
            .get(&user_id)
            .map(|entry| {
                entry
                    .lines
                    .iter()
                    .map(|(&listing_id, &quantity)| CartLine {
                        cart_id: entry.id,
                        listing_id,
                        quantity,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        let mut carts = self.carts.write().unwrap();
        if let Some(entry) = carts.get_mut(&user_id) {
            entry.lines.clear();
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()> {
        let mut orders = self.orders.write().unwrap();
        orders.insert(order.id, (order.clone(), lines.to_vec()));
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().unwrap();
        Ok(orders.get(&id).map(|(order, _)| order.clone()))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().unwrap();
        let mut result: Vec<Order> = orders
            .values()
            .filter(|(order, _)| order.user_id == user_id)
            .map(|(order, _)| order.clone())
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let orders = self.orders.read().unwrap();
        let mut lines = orders
            .get(&order_id)
            .map(|(_, lines)| lines.clone())
            .unwrap_or_default();
        lines.sort_by_key(|line| line.listing_id);
        Ok(lines)
    }
}

#[async_trait]
impl CheckoutJournal for InMemoryStore {
    async fn open_checkout(&self, record: &CheckoutRecord) -> Result<()> {
        let mut checkouts = self.checkouts.write().unwrap();
        checkouts.insert(record.id, record.clone());
        Ok(())
    }

    async fn journal_reservation(
        &self,
        checkout_id: CheckoutId,
        listing_id: ListingId,
        quantity: u32,
    ) -> Result<()> {
        let mut checkouts = self.checkouts.write().unwrap();
        let record = checkouts
            .get_mut(&checkout_id)
            .ok_or(StoreError::CheckoutNotFound(checkout_id))?;
        record.reservations.push(crate::records::ReservedLine {
            listing_id,
            quantity,
        });
        Ok(())
    }

    async fn close_checkout(&self, checkout_id: CheckoutId, state: CheckoutState) -> Result<()> {
        let mut checkouts = self.checkouts.write().unwrap();
        let record = checkouts
            .get_mut(&checkout_id)
            .ok_or(StoreError::CheckoutNotFound(checkout_id))?;
        record.state = state;
        Ok(())
    }

    async fn open_checkouts(&self) -> Result<Vec<CheckoutRecord>> {
        let checkouts = self.checkouts.read().unwrap();
        let mut open: Vec<CheckoutRecord> = checkouts
            .values()
            .filter(|record| !record.state.is_settled())
            .cloned()
            .collect();
        open.sort_by_key(|record| record.created_at);
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Money;

    fn seed_listing(store: &InMemoryStore, stock: u32, max_buy: Option<u32>) -> ListingId {
        let product = Product {
            id: ProductId::new(),
            name: "Widget".to_string(),
            brand: Some("Acme".to_string()),
            max_buy,
        };
        let seller = Seller {
            id: SellerId::new(),
            name: "Acme Store".to_string(),
        };
        let listing = Listing {
            id: ListingId::new(),
            seller_id: seller.id,
            product_id: product.id,
            price: Money::from_cents(1000),
            stock,
            active: true,
        };
        let listing_id = listing.id;
        store.add_product(product);
        store.add_seller(seller);
        store.add_listing(listing);
        listing_id
    }

    #[tokio::test]
    async fn test_reserve_decrements_stock() {
        let store = InMemoryStore::new();
        let listing_id = seed_listing(&store, 10, None);

        store.reserve(listing_id, 3).await.unwrap();
        assert_eq!(store.stock_of(listing_id).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_reserve_insufficient_stock_leaves_stock_untouched() {
        let store = InMemoryStore::new();
        let listing_id = seed_listing(&store, 2, None);

        let result = store.reserve(listing_id, 3).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            })
        ));
        assert_eq!(store.stock_of(listing_id).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reserve_unknown_listing() {
        let store = InMemoryStore::new();
        let result = store.reserve(ListingId::new(), 1).await;
        assert!(matches!(result, Err(StoreError::ListingNotFound(_))));
    }

    #[tokio::test]
    async fn test_reserve_inactive_listing_reports_zero_available() {
        let store = InMemoryStore::new();
        let listing_id = seed_listing(&store, 10, None);
        store.set_listing_active(listing_id, false).unwrap();

        let result = store.reserve(listing_id, 1).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock { available: 0, .. })
        ));
        assert_eq!(store.stock_of(listing_id).unwrap(), 10);
    }

    #[tokio::test]
    async fn test_release_restores_stock_even_when_inactive() {
        let store = InMemoryStore::new();
        let listing_id = seed_listing(&store, 5, None);

        store.reserve(listing_id, 4).await.unwrap();
        store.set_listing_active(listing_id, false).unwrap();
        store.release(listing_id, 4).await.unwrap();

        assert_eq!(store.stock_of(listing_id).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_max_allowed_is_min_of_stock_and_cap() {
        let store = InMemoryStore::new();
        let capped = seed_listing(&store, 10, Some(5));
        let low_stock = seed_listing(&store, 3, Some(5));
        let unlimited = seed_listing(&store, 7, None);

        assert_eq!(store.max_allowed(capped).await.unwrap(), 5);
        assert_eq!(store.max_allowed(low_stock).await.unwrap(), 3);
        assert_eq!(store.max_allowed(unlimited).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_max_allowed_zero_for_inactive() {
        let store = InMemoryStore::new();
        let listing_id = seed_listing(&store, 10, Some(5));
        store.set_listing_active(listing_id, false).unwrap();

        assert_eq!(store.max_allowed(listing_id).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_reserves_never_oversell() {
        let store = InMemoryStore::new();
        let listing_id = seed_listing(&store, 5, None);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.reserve(listing_id, 1).await },
            ));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }

        assert_eq!(granted, 5);
        assert_eq!(store.stock_of(listing_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cart_created_lazily_and_stays_stable() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();

        let cart = store.cart_for_user(user_id).await.unwrap();
        let again = store.cart_for_user(user_id).await.unwrap();
        assert_eq!(cart.id, again.id);
    }

    #[tokio::test]
    async fn test_put_line_upserts() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let listing_id = seed_listing(&store, 10, None);

        let line = store.put_line(user_id, listing_id, 2).await.unwrap();
        assert_eq!(line.quantity, 2);

        let line = store.put_line(user_id, listing_id, 5).await.unwrap();
        assert_eq!(line.quantity, 5);

        let lines = store.lines(user_id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_remove_line_not_found() {
        let store = InMemoryStore::new();
        let result = store.remove_line(UserId::new(), ListingId::new()).await;
        assert!(matches!(result, Err(StoreError::LineNotFound(_))));
    }

    #[tokio::test]
    async fn test_lines_ordered_by_listing_id() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let a = seed_listing(&store, 10, None);
        let b = seed_listing(&store, 10, None);
        let c = seed_listing(&store, 10, None);

        for listing_id in [c, a, b] {
            store.put_line(user_id, listing_id, 1).await.unwrap();
        }

        let ids: Vec<ListingId> = store
            .lines(user_id)
            .await
            .unwrap()
            .iter()
            .map(|l| l.listing_id)
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn test_clear_cart() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let listing_id = seed_listing(&store, 10, None);

        store.put_line(user_id, listing_id, 2).await.unwrap();
        store.clear(user_id).await.unwrap();

        assert!(store.lines(user_id).await.unwrap().is_empty());
        // Clearing an absent cart is not an error.
        store.clear(UserId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_order_roundtrip() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let order = Order {
            id: OrderId::new(),
            user_id,
            created_at: Utc::now(),
            total: Money::from_cents(3000),
            status: crate::records::OrderStatus::Pending,
        };
        let lines = vec![OrderLine {
            order_id: order.id,
            listing_id: ListingId::new(),
            quantity: 3,
            unit_price: Money::from_cents(1000),
        }];

        store.insert_order(&order, &lines).await.unwrap();

        assert_eq!(store.order(order.id).await.unwrap(), Some(order.clone()));
        assert_eq!(store.orders_for_user(user_id).await.unwrap().len(), 1);
        assert_eq!(store.order_lines(order.id).await.unwrap(), lines);
        assert!(
            store
                .orders_for_user(UserId::new())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_checkout_journal_lifecycle() {
        let store = InMemoryStore::new();
        let record = CheckoutRecord {
            id: CheckoutId::new(),
            user_id: UserId::new(),
            order_id: OrderId::new(),
            state: CheckoutState::Reserving,
            created_at: Utc::now(),
            reservations: Vec::new(),
        };

        store.open_checkout(&record).await.unwrap();
        store
            .journal_reservation(record.id, ListingId::new(), 2)
            .await
            .unwrap();

        let open = store.open_checkouts().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].reservations.len(), 1);

        store
            .close_checkout(record.id, CheckoutState::Committed)
            .await
            .unwrap();
        assert!(store.open_checkouts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_journal_unknown_checkout() {
        let store = InMemoryStore::new();
        let result = store
            .close_checkout(CheckoutId::new(), CheckoutState::Aborted)
            .await;
        assert!(matches!(result, Err(StoreError::CheckoutNotFound(_))));
    }
}
