use common::{CheckoutId, ListingId, OrderId};
use thiserror::Error;

/// Errors that can occur when interacting with the marketplace store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The listing does not exist.
    #[error("listing not found: {0}")]
    ListingNotFound(ListingId),

    /// A reservation could not be granted.
    ///
    /// Also covers listings that went inactive: an inactive listing has an
    /// available quantity of zero as far as reservations are concerned.
    #[error(
        "insufficient stock for listing {listing_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        listing_id: ListingId,
        requested: u32,
        available: u32,
    },

    /// The user's cart has no line for the listing.
    #[error("no cart line for listing {0}")]
    LineNotFound(ListingId),

    /// The order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The checkout journal has no record with this id.
    #[error("checkout record not found: {0}")]
    CheckoutNotFound(CheckoutId),

    /// A stored value could not be interpreted.
    #[error("unrecognized {field} value in storage: {value}")]
    Corrupt { field: &'static str, value: String },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
