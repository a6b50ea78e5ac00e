//! Storage layer for the marketplace.
//!
//! Exposes the seam traits the service crates are written against:
//! - [`Catalog`] — read-only listing/product/seller lookup
//! - [`StockLedger`] — atomic stock reservation and release
//! - [`CartStore`] — per-user cart lines
//! - [`OrderStore`] — immutable order records
//! - [`CheckoutJournal`] — checkout attempts, for crash recovery
//!
//! Two implementations are provided: [`InMemoryStore`] for tests and the
//! dev server, and [`PostgresStore`] backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    Cart, CartLine, CheckoutRecord, CheckoutState, Listing, Order, OrderLine, OrderStatus,
    Product, ReservedLine, Seller,
};
pub use traits::{Catalog, CartStore, CheckoutJournal, MarketStore, OrderStore, StockLedger};
