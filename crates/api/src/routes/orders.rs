//! Order projection endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use serde::Serialize;
use store::{MarketStore, Order};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub created_at: String,
    pub total_cents: i64,
    pub status: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            created_at: order.created_at.to_rfc3339(),
            total_cents: order.total.cents(),
            status: order.status.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub listing_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// GET /orders — the caller's order headers, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(user_id): Identity,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(user_id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/{id} — one of the caller's order headers.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(user_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.get_order(user_id, order_id).await?;
    Ok(Json(order.into()))
}

/// GET /orders/{id}/lines — the lines of one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn lines<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(user_id): Identity,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderLineResponse>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let lines = state.orders.order_lines(user_id, order_id).await?;

    Ok(Json(
        lines
            .into_iter()
            .map(|line| OrderLineResponse {
                listing_id: line.listing_id.to_string(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                subtotal_cents: line.subtotal().cents(),
            })
            .collect(),
    ))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid =
        Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(format!("invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
