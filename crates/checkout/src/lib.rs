//! Checkout coordination for the marketplace.
//!
//! Turns a cart into an order as one unit: validate against live
//! inventory, reserve stock per line in deterministic order, write the
//! order, clear the cart. Any failure along the way releases every
//! reservation already granted, so a checkout is never partially visible.

pub mod coordinator;
pub mod error;

pub use coordinator::{CheckoutCoordinator, PlacedOrder, RecoveryReport};
pub use error::CheckoutError;
