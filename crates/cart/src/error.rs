use common::ListingId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The listing does not exist or is not visible (inactive listings are
    /// reported exactly like absent ones).
    #[error("listing not found: {0}")]
    ListingNotFound(ListingId),

    /// The listing exists but has no purchasable stock right now.
    #[error("listing {0} is out of stock")]
    OutOfStock(ListingId),

    /// The user's cart has no line for the listing.
    #[error("no cart line for listing {0}")]
    LineNotFound(ListingId),

    /// A requested quantity of zero.
    #[error("quantity must be positive")]
    InvalidQuantity,

    /// A storage failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
