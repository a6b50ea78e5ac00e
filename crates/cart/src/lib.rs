//! Cart aggregate for the marketplace.
//!
//! The store keeps cart lines; this crate owns the mutation policy: every
//! stored quantity respects the ceiling `min(listing stock, product
//! max-buy cap)` at the time of the mutation, and additions that would
//! exceed it are clamped and reported rather than rejected.

pub mod error;
pub mod service;

pub use error::CartError;
pub use service::{CartLineView, CartService, CartUpdate, DecreaseOutcome};
