use common::ListingId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A line could not be covered by current inventory. Carries the
    /// offending listing so the caller can point at the exact problem.
    ///
    /// Also raised when a carted listing went inactive or disappeared
    /// before settlement: the whole checkout fails, no partial orders.
    #[error("insufficient stock for listing {0}")]
    InsufficientStock(ListingId),

    /// A storage failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
