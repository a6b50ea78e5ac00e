//! Plain records persisted by the store.

use chrono::{DateTime, Utc};
use common::{CartId, CheckoutId, ListingId, Money, OrderId, ProductId, SellerId, UserId};
use serde::{Deserialize, Serialize};

/// A catalog-level product, shared by every seller offering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: Option<String>,
    /// Per-order purchase cap; `None` means unlimited.
    pub max_buy: Option<u32>,
}

/// A seller on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: SellerId,
    pub name: String,
}

/// One seller's offer of one product, with its own price and stock.
///
/// Stock is the shared mutable state of the system; it is only ever
/// mutated through [`crate::StockLedger`] and is never observed negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub price: Money,
    pub stock: u32,
    pub active: bool,
}

/// A user's cart. One per user, created lazily on first mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
}

/// A line in a cart: at most one per `(cart, listing)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub quantity: u32,
}

/// Status of a placed order. Orders are created `Pending`; the rest of the
/// fulfillment lifecycle is handled outside this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Header of a placed order. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub total: Money,
    pub status: OrderStatus,
}

/// A line of a placed order, snapshotted at order-creation time and
/// independent of later listing or stock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub listing_id: ListingId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns the line subtotal (quantity x unit price).
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// State of a checkout attempt in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutState {
    /// Reservations may have been granted; the order is not yet durable.
    Reserving,
    /// The order was written; the attempt is settled.
    Committed,
    /// The attempt was abandoned and all granted reservations released.
    Aborted,
}

impl CheckoutState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Reserving => "reserving",
            CheckoutState::Committed => "committed",
            CheckoutState::Aborted => "aborted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "reserving" => Some(CheckoutState::Reserving),
            "committed" => Some(CheckoutState::Committed),
            "aborted" => Some(CheckoutState::Aborted),
            _ => None,
        }
    }

    /// Returns true once the attempt needs no recovery.
    pub fn is_settled(&self) -> bool {
        matches!(self, CheckoutState::Committed | CheckoutState::Aborted)
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stock reservation granted during a checkout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedLine {
    pub listing_id: ListingId,
    pub quantity: u32,
}

/// Journal record of one checkout attempt.
///
/// The order id is allocated before any stock is touched so that recovery
/// can tell a crashed-but-committed attempt from a crashed-while-reserving
/// one by looking the order up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRecord {
    pub id: CheckoutId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub state: CheckoutState,
    pub created_at: DateTime<Utc>,
    pub reservations: Vec<ReservedLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_line_subtotal() {
        let line = OrderLine {
            order_id: OrderId::new(),
            listing_id: ListingId::new(),
            quantity: 3,
            unit_price: Money::from_cents(1250),
        };
        assert_eq!(line.subtotal().cents(), 3750);
    }

    #[test]
    fn test_order_status_roundtrip() {
        assert_eq!(OrderStatus::from_str("pending"), Some(OrderStatus::Pending));
        assert_eq!(OrderStatus::from_str("shipped"), None);
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn test_checkout_state_roundtrip() {
        for state in [
            CheckoutState::Reserving,
            CheckoutState::Committed,
            CheckoutState::Aborted,
        ] {
            assert_eq!(CheckoutState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(CheckoutState::from_str("pending"), None);
    }

    #[test]
    fn test_settled_states() {
        assert!(!CheckoutState::Reserving.is_settled());
        assert!(CheckoutState::Committed.is_settled());
        assert!(CheckoutState::Aborted.is_settled());
    }
}
