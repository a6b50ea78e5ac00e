//! The checkout coordinator.

use chrono::Utc;
use common::{CheckoutId, Money, OrderId, UserId};
use store::{
    CheckoutRecord, CheckoutState, MarketStore, Order, OrderLine, OrderStatus, ReservedLine,
    StoreError,
};

use crate::error::CheckoutError;

/// The result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// What startup recovery did with leftover checkout attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Attempts whose order turned out to be durable; marked committed.
    pub committed: usize,
    /// Attempts without an order; their reservations were released.
    pub rolled_back: usize,
}

/// Drives the cart → order settlement sequence.
///
/// The sequence is validate → reserve → commit → clear. Reservations are
/// taken per listing in ascending listing-id order across all concurrent
/// checkouts, and every grant is journaled before the next step so a crash
/// between reservation and commit is repairable by [`recover`].
///
/// [`recover`]: CheckoutCoordinator::recover
pub struct CheckoutCoordinator<S> {
    store: S,
}

impl<S: MarketStore> CheckoutCoordinator<S> {
    /// Creates a new coordinator over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Converts the user's cart into an order, atomically with respect to
    /// inventory: either the order exists and stock moved by exactly its
    /// line quantities, or neither happened.
    ///
    /// Callers that may be cancelled mid-flight (request handlers) should
    /// run this on a detached task; a partially-run future is otherwise
    /// repaired by [`recover`] on the next startup.
    ///
    /// [`recover`]: CheckoutCoordinator::recover
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<PlacedOrder, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run_checkout(user_id).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(placed) => {
                metrics::counter!("checkout_completed").increment(1);
                tracing::info!(
                    order_id = %placed.order.id,
                    total = %placed.order.total,
                    lines = placed.lines.len(),
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed").increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }

        result
    }

    async fn run_checkout(&self, user_id: UserId) -> Result<PlacedOrder, CheckoutError> {
        // Validating: nothing is journaled or reserved yet, so failures
        // here leave no trace to clean up.
        let cart_lines = self.store.lines(user_id).await?;
        if cart_lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let order_id = OrderId::new();
        let mut validated = Vec::with_capacity(cart_lines.len());
        for line in &cart_lines {
            let listing = match self.store.listing(line.listing_id).await? {
                Some(listing) if listing.active => listing,
                // Deactivated or vanished since it was carted: the whole
                // checkout fails, never a partial order.
                _ => return Err(CheckoutError::InsufficientStock(line.listing_id)),
            };

            // The cart's stored bound may be stale; recompute the ceiling
            // against current inventory.
            let ceiling = self.store.max_allowed(line.listing_id).await?;
            if line.quantity > ceiling {
                return Err(CheckoutError::InsufficientStock(line.listing_id));
            }

            validated.push(OrderLine {
                order_id,
                listing_id: line.listing_id,
                quantity: line.quantity,
                unit_price: listing.price,
            });
        }

        // Fixed global reservation order keeps concurrent checkouts that
        // share listings from deadlocking against the ledger.
        validated.sort_by_key(|line| line.listing_id);
        let total: Money = validated.iter().map(|line| line.subtotal()).sum();

        // Reserving: journal the attempt before touching stock, and every
        // grant before the next one, so recovery always knows what to undo.
        let checkout_id = CheckoutId::new();
        let record = CheckoutRecord {
            id: checkout_id,
            user_id,
            order_id,
            state: CheckoutState::Reserving,
            created_at: Utc::now(),
            reservations: Vec::new(),
        };
        self.store.open_checkout(&record).await?;

        let mut granted: Vec<ReservedLine> = Vec::new();
        for line in &validated {
            match self.store.reserve(line.listing_id, line.quantity).await {
                Ok(()) => {
                    granted.push(ReservedLine {
                        listing_id: line.listing_id,
                        quantity: line.quantity,
                    });
                    if let Err(e) = self
                        .store
                        .journal_reservation(checkout_id, line.listing_id, line.quantity)
                        .await
                    {
                        self.compensate(checkout_id, &granted).await;
                        return Err(e.into());
                    }
                }
                Err(
                    StoreError::InsufficientStock { listing_id, .. }
                    | StoreError::ListingNotFound(listing_id),
                ) => {
                    self.compensate(checkout_id, &granted).await;
                    return Err(CheckoutError::InsufficientStock(listing_id));
                }
                Err(e) => {
                    self.compensate(checkout_id, &granted).await;
                    return Err(e.into());
                }
            }
        }

        // Committing: the order becomes durable, then the journal record is
        // settled. If the record can't be settled the order still stands;
        // recovery closes it later.
        let order = Order {
            id: order_id,
            user_id,
            created_at: Utc::now(),
            total,
            status: OrderStatus::Pending,
        };
        if let Err(e) = self.store.insert_order(&order, &validated).await {
            self.compensate(checkout_id, &granted).await;
            return Err(e.into());
        }
        if let Err(e) = self
            .store
            .close_checkout(checkout_id, CheckoutState::Committed)
            .await
        {
            tracing::warn!(%checkout_id, error = %e, "failed to settle checkout record");
        }

        // Clearing: best-effort cleanup, not part of the correctness
        // contract. The order stands even if this fails.
        if let Err(e) = self.store.clear(user_id).await {
            tracing::warn!(%user_id, error = %e, "failed to clear cart after checkout");
        }

        Ok(PlacedOrder {
            order,
            lines: validated,
        })
    }

    /// Releases granted reservations in reverse order and settles the
    /// journal record as aborted.
    ///
    /// Release failures are logged and skipped: the remaining grants must
    /// still be returned.
    async fn compensate(&self, checkout_id: CheckoutId, granted: &[ReservedLine]) {
        for reservation in granted.iter().rev() {
            if let Err(e) = self
                .store
                .release(reservation.listing_id, reservation.quantity)
                .await
            {
                tracing::error!(
                    listing_id = %reservation.listing_id,
                    quantity = reservation.quantity,
                    error = %e,
                    "failed to release reservation during compensation"
                );
            }
        }

        if let Err(e) = self
            .store
            .close_checkout(checkout_id, CheckoutState::Aborted)
            .await
        {
            tracing::error!(%checkout_id, error = %e, "failed to mark checkout aborted");
        }
    }

    /// Repairs checkout attempts left in the `Reserving` state by a crash.
    ///
    /// Recovery re-validates instead of blindly retrying: if the attempt's
    /// order turns out to be durable the record is marked committed and
    /// stock is left alone; otherwise the journaled reservations are
    /// released. Safe to run on every startup.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<RecoveryReport, CheckoutError> {
        let open = self.store.open_checkouts().await?;
        let mut report = RecoveryReport::default();

        for record in open {
            if self.store.order(record.order_id).await?.is_some() {
                self.store
                    .close_checkout(record.id, CheckoutState::Committed)
                    .await?;
                report.committed += 1;
                tracing::info!(
                    checkout_id = %record.id,
                    order_id = %record.order_id,
                    "recovered checkout whose order was already durable"
                );
            } else {
                for reservation in record.reservations.iter().rev() {
                    if let Err(e) = self
                        .store
                        .release(reservation.listing_id, reservation.quantity)
                        .await
                    {
                        tracing::error!(
                            listing_id = %reservation.listing_id,
                            error = %e,
                            "failed to release reservation during recovery"
                        );
                    }
                }
                self.store
                    .close_checkout(record.id, CheckoutState::Aborted)
                    .await?;
                report.rolled_back += 1;
                tracing::warn!(
                    checkout_id = %record.id,
                    reservations = record.reservations.len(),
                    "rolled back checkout that never committed"
                );
            }
        }

        Ok(report)
    }
}
