//! Ownership-filtered order lookups.

use common::{OrderId, UserId};
use store::{Order, OrderLine, OrderStore, StoreError};
use thiserror::Error;

/// Errors that can occur when querying orders.
#[derive(Debug, Error)]
pub enum OrdersError {
    /// The order does not exist — or belongs to another user, which is
    /// deliberately indistinguishable.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// A storage failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Query service for a user's own orders.
pub struct OrderQueries<S> {
    store: S,
}

impl<S: OrderStore> OrderQueries<S> {
    /// Creates a new query service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All orders placed by the user, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrdersError> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// One order header, if the user owns it.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrdersError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(OrdersError::NotFound(order_id))?;

        if order.user_id != user_id {
            return Err(OrdersError::NotFound(order_id));
        }

        Ok(order)
    }

    /// The lines of one of the user's orders.
    #[tracing::instrument(skip(self))]
    pub async fn order_lines(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, OrdersError> {
        // Ownership check first; the lines themselves carry no owner.
        self.get_order(user_id, order_id).await?;
        Ok(self.store.order_lines(order_id).await?)
    }
}
