//! Shared types for the marketplace services.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CartId, CheckoutId, ListingId, OrderId, ProductId, SellerId, UserId};
