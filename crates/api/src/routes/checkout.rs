//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::PlacedOrder;
use serde::Serialize;
use store::MarketStore;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub listing_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct PlacedOrderResponse {
    pub order_id: String,
    pub created_at: String,
    pub total_cents: i64,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
}

impl From<PlacedOrder> for PlacedOrderResponse {
    fn from(placed: PlacedOrder) -> Self {
        Self {
            order_id: placed.order.id.to_string(),
            created_at: placed.order.created_at.to_rfc3339(),
            total_cents: placed.order.total.cents(),
            status: placed.order.status.to_string(),
            lines: placed
                .lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    listing_id: line.listing_id.to_string(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                })
                .collect(),
        }
    }
}

/// POST /checkout — convert the cart into an order, all-or-nothing.
#[tracing::instrument(skip(state))]
pub async fn create<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(user_id): Identity,
) -> Result<(StatusCode, Json<PlacedOrderResponse>), ApiError> {
    // The settlement sequence must reach a terminal state even if the
    // caller disconnects, so it runs on its own task; dropping this
    // handler future does not cancel it.
    let placed = tokio::spawn(async move { state.checkout.checkout(user_id).await })
        .await
        .map_err(|e| ApiError::Internal(format!("checkout task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(placed.into())))
}
