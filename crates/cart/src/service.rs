//! Cart mutation policy and the cart display projection.

use common::{ListingId, Money, UserId};
use store::{CartLine, CartStore, Catalog, StockLedger, StoreError};

use crate::error::CartError;

/// Result of adding to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartUpdate {
    /// The line as stored.
    pub line: CartLine,
    /// True when the stored quantity was clamped to the ceiling instead of
    /// the requested total.
    pub clamped: bool,
}

/// Result of decreasing a line by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecreaseOutcome {
    /// The line remains with the reduced quantity.
    Updated(CartLine),
    /// The quantity reached zero and the line was removed.
    Removed,
}

/// A cart line joined with its display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineView {
    pub listing_id: ListingId,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
    pub product_name: String,
    pub brand: Option<String>,
    pub seller_name: String,
    pub in_stock: bool,
}

/// Service enforcing the cart's quantity ceiling on every mutation.
///
/// The ceiling read here is a snapshot; checkout re-validates every line
/// against live inventory before any stock moves.
pub struct CartService<S> {
    store: S,
}

impl<S> CartService<S>
where
    S: CartStore + Catalog + StockLedger,
{
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds `quantity` units of a listing to the user's cart, creating the
    /// cart and the line as needed.
    ///
    /// The target quantity is the existing line quantity plus the request,
    /// clamped to `min(stock, max_buy)`. A clamped add still succeeds and
    /// reports `clamped: true`; it never silently drops the request or
    /// exceeds the cap.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        listing_id: ListingId,
        quantity: u32,
    ) -> Result<CartUpdate, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let listing = self
            .store
            .listing(listing_id)
            .await?
            .ok_or(CartError::ListingNotFound(listing_id))?;
        if !listing.active {
            return Err(CartError::ListingNotFound(listing_id));
        }

        let ceiling = self.store.max_allowed(listing_id).await?;
        if ceiling == 0 {
            return Err(CartError::OutOfStock(listing_id));
        }

        let existing = self
            .store
            .line(user_id, listing_id)
            .await?
            .map(|line| line.quantity)
            .unwrap_or(0);

        let desired = existing.saturating_add(quantity);
        let clamped = desired > ceiling;
        let stored = desired.min(ceiling);

        let line = self.store.put_line(user_id, listing_id, stored).await?;

        if clamped {
            metrics::counter!("cart_adds_clamped_total").increment(1);
            tracing::debug!(%listing_id, desired, stored, "cart add clamped to ceiling");
        }

        Ok(CartUpdate { line, clamped })
    }

    /// Decreases the line's quantity by one, removing the line when it
    /// reaches zero.
    #[tracing::instrument(skip(self))]
    pub async fn decrease_line(
        &self,
        user_id: UserId,
        listing_id: ListingId,
    ) -> Result<DecreaseOutcome, CartError> {
        let line = self
            .store
            .line(user_id, listing_id)
            .await?
            .ok_or(CartError::LineNotFound(listing_id))?;

        if line.quantity > 1 {
            let updated = self
                .store
                .put_line(user_id, listing_id, line.quantity - 1)
                .await?;
            Ok(DecreaseOutcome::Updated(updated))
        } else {
            self.remove_store_line(user_id, listing_id).await?;
            Ok(DecreaseOutcome::Removed)
        }
    }

    /// Removes the line unconditionally.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        user_id: UserId,
        listing_id: ListingId,
    ) -> Result<(), CartError> {
        self.remove_store_line(user_id, listing_id).await
    }

    /// Returns the cart joined with display data.
    ///
    /// Lines whose listing has vanished or gone inactive are pruned here
    /// rather than silently kept; they can no longer be checked out.
    #[tracing::instrument(skip(self))]
    pub async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartLineView>, CartError> {
        let lines = self.store.lines(user_id).await?;
        let mut views = Vec::with_capacity(lines.len());

        for line in lines {
            let listing = match self.store.listing(line.listing_id).await? {
                Some(listing) if listing.active => listing,
                _ => {
                    tracing::info!(listing_id = %line.listing_id, "pruning dead cart line");
                    // A concurrent removal of the same line is fine.
                    match self.store.remove_line(user_id, line.listing_id).await {
                        Ok(()) | Err(StoreError::LineNotFound(_)) => {}
                        Err(e) => return Err(e.into()),
                    }
                    continue;
                }
            };

            let (product_name, brand) = match self.store.product(listing.product_id).await? {
                Some(product) => (product.name, product.brand),
                None => (String::new(), None),
            };
            let seller_name = self
                .store
                .seller(listing.seller_id)
                .await?
                .map(|seller| seller.name)
                .unwrap_or_default();

            views.push(CartLineView {
                listing_id: line.listing_id,
                quantity: line.quantity,
                unit_price: listing.price,
                subtotal: listing.price.multiply(line.quantity),
                product_name,
                brand,
                seller_name,
                in_stock: listing.stock > 0,
            });
        }

        Ok(views)
    }

    async fn remove_store_line(
        &self,
        user_id: UserId,
        listing_id: ListingId,
    ) -> Result<(), CartError> {
        match self.store.remove_line(user_id, listing_id).await {
            Ok(()) => Ok(()),
            Err(StoreError::LineNotFound(id)) => Err(CartError::LineNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}
