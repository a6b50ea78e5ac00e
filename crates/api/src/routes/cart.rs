//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use cart::{CartLineView, DecreaseOutcome};
use common::ListingId;
use serde::{Deserialize, Serialize};
use store::MarketStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub listing_id: Uuid,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartLineResponse {
    pub listing_id: String,
    pub quantity: u32,
    /// True when the stored quantity was clamped to the purchase ceiling.
    pub clamped: bool,
}

#[derive(Serialize)]
pub struct DecreaseResponse {
    pub removed: bool,
    pub quantity: Option<u32>,
}

#[derive(Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

#[derive(Serialize)]
pub struct CartViewResponse {
    pub listing_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
    pub product_name: String,
    pub brand: Option<String>,
    pub seller_name: String,
    pub in_stock: bool,
}

impl From<CartLineView> for CartViewResponse {
    fn from(view: CartLineView) -> Self {
        Self {
            listing_id: view.listing_id.to_string(),
            quantity: view.quantity,
            unit_price_cents: view.unit_price.cents(),
            subtotal_cents: view.subtotal.cents(),
            product_name: view.product_name,
            brand: view.brand,
            seller_name: view.seller_name,
            in_stock: view.in_stock,
        }
    }
}

// -- Handlers --

/// POST /cart/items — add units of a listing to the cart (possibly clamped).
#[tracing::instrument(skip(state, req))]
pub async fn add<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(user_id): Identity,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartLineResponse>, ApiError> {
    let listing_id = ListingId::from_uuid(req.listing_id);
    let update = state
        .cart
        .add_to_cart(user_id, listing_id, req.quantity)
        .await?;

    Ok(Json(CartLineResponse {
        listing_id: update.line.listing_id.to_string(),
        quantity: update.line.quantity,
        clamped: update.clamped,
    }))
}

/// POST /cart/items/{listing_id}/decrease — reduce a line by one unit.
#[tracing::instrument(skip(state))]
pub async fn decrease<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(user_id): Identity,
    Path(listing_id): Path<String>,
) -> Result<Json<DecreaseResponse>, ApiError> {
    let listing_id = parse_listing_id(&listing_id)?;
    let outcome = state.cart.decrease_line(user_id, listing_id).await?;

    Ok(Json(match outcome {
        DecreaseOutcome::Updated(line) => DecreaseResponse {
            removed: false,
            quantity: Some(line.quantity),
        },
        DecreaseOutcome::Removed => DecreaseResponse {
            removed: true,
            quantity: None,
        },
    }))
}

/// DELETE /cart/items/{listing_id} — remove a line unconditionally.
#[tracing::instrument(skip(state))]
pub async fn remove<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(user_id): Identity,
    Path(listing_id): Path<String>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let listing_id = parse_listing_id(&listing_id)?;
    state.cart.remove_line(user_id, listing_id).await?;
    Ok(Json(RemoveResponse { removed: true }))
}

/// GET /cart — list the cart with display data.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(user_id): Identity,
) -> Result<Json<Vec<CartViewResponse>>, ApiError> {
    let views = state.cart.list_cart(user_id).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

fn parse_listing_id(id: &str) -> Result<ListingId, ApiError> {
    let uuid = Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid listing id: {e}")))?;
    Ok(ListingId::from_uuid(uuid))
}
