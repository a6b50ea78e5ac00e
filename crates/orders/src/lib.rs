//! Read-side projections over placed orders.
//!
//! Orders are immutable once created; everything here is a lookup with
//! ownership filtering. An order owned by someone else is reported exactly
//! like a missing one, so callers can't probe for other users' orders.

pub mod queries;

pub use queries::{OrderQueries, OrdersError};
