//! Seam traits the service crates are written against.

use async_trait::async_trait;
use common::{CheckoutId, ListingId, OrderId, ProductId, SellerId, UserId};

use crate::Result;
use crate::records::{
    Cart, CartLine, CheckoutRecord, CheckoutState, Listing, Order, OrderLine, Product, Seller,
};

/// Read-only catalog access.
///
/// The core never mutates the catalog; price, activation, and restocking
/// changes arrive from outside through the concrete store types.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up a listing by id, whether active or not.
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>>;

    /// Looks up a product by id.
    async fn product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Looks up a seller by id.
    async fn seller(&self, id: SellerId) -> Result<Option<Seller>>;
}

/// The inventory ledger: the one shared mutable resource in the system.
///
/// Implementations must make `reserve` atomic with respect to concurrent
/// `reserve` calls on the same listing — no lost updates and no negative
/// stock is ever observable — and must not let operations on different
/// listings block each other.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Atomically checks `stock >= quantity` and decrements.
    ///
    /// Fails with [`crate::StoreError::InsufficientStock`] (no mutation)
    /// when the listing is short or inactive, and
    /// [`crate::StoreError::ListingNotFound`] when it does not exist.
    /// Never waits for stock to replenish.
    async fn reserve(&self, listing_id: ListingId, quantity: u32) -> Result<()>;

    /// Returns previously reserved units to stock (compensation).
    ///
    /// Works on inactive listings too: compensation must always succeed
    /// where the row still exists.
    async fn release(&self, listing_id: ListingId, quantity: u32) -> Result<()>;

    /// Snapshot of the quantity ceiling for a single cart line:
    /// `min(current stock, product max_buy)`, 0 for inactive listings.
    ///
    /// Advisory only — the ceiling can change between read and write, so
    /// callers re-validate through `reserve` at settlement time.
    async fn max_allowed(&self, listing_id: ListingId) -> Result<u32>;
}

/// Per-user cart storage. Quantity policy (clamping) lives above this seam
/// in the cart service; the store only enforces the structural invariants
/// (one cart per user, one line per listing, positive quantities).
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the user's cart, creating it on first use.
    async fn cart_for_user(&self, user_id: UserId) -> Result<Cart>;

    /// Returns the line for the listing, if present.
    async fn line(&self, user_id: UserId, listing_id: ListingId) -> Result<Option<CartLine>>;

    /// Inserts the line or replaces its quantity, creating the cart lazily.
    async fn put_line(
        &self,
        user_id: UserId,
        listing_id: ListingId,
        quantity: u32,
    ) -> Result<CartLine>;

    /// Deletes the line; fails with [`crate::StoreError::LineNotFound`]
    /// when absent.
    async fn remove_line(&self, user_id: UserId, listing_id: ListingId) -> Result<()>;

    /// All lines in the user's cart, ordered by listing id. Empty when the
    /// user has no cart yet.
    async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Deletes every line in the user's cart. A missing cart is fine.
    async fn clear(&self, user_id: UserId) -> Result<()>;
}

/// Immutable order records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists an order header with its lines, atomically where the
    /// backend supports it.
    async fn insert_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()>;

    /// Looks up an order header by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// All orders placed by the user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// The lines of an order, ordered by listing id.
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>>;
}

/// Journal of checkout attempts.
///
/// The journal is written before stock is touched and settled after the
/// order is durable, which is what makes the reservation/commit window
/// recoverable after a crash.
#[async_trait]
pub trait CheckoutJournal: Send + Sync {
    /// Records a new checkout attempt in the `Reserving` state.
    async fn open_checkout(&self, record: &CheckoutRecord) -> Result<()>;

    /// Records one granted reservation under the attempt.
    async fn journal_reservation(
        &self,
        checkout_id: CheckoutId,
        listing_id: ListingId,
        quantity: u32,
    ) -> Result<()>;

    /// Moves the attempt to a settled state (`Committed` or `Aborted`).
    async fn close_checkout(&self, checkout_id: CheckoutId, state: CheckoutState) -> Result<()>;

    /// All attempts still in the `Reserving` state, oldest first.
    async fn open_checkouts(&self) -> Result<Vec<CheckoutRecord>>;
}

/// Umbrella trait for a complete marketplace store.
pub trait MarketStore: Catalog + StockLedger + CartStore + OrderStore + CheckoutJournal {}

impl<T> MarketStore for T where T: Catalog + StockLedger + CartStore + OrderStore + CheckoutJournal {}
