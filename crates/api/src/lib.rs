//! HTTP API server for the marketplace checkout core.
//!
//! Exposes the cart, checkout, and order operations over REST, with
//! structured logging (tracing) and Prometheus metrics. Authentication is
//! external; handlers receive the authenticated user id via the
//! `X-User-Id` header (see [`identity::Identity`]).

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use cart::CartService;
use checkout::CheckoutCoordinator;
use metrics_exporter_prometheus::PrometheusHandle;
use orders::OrderQueries;
use store::MarketStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub cart: CartService<S>,
    pub checkout: CheckoutCoordinator<S>,
    pub orders: OrderQueries<S>,
    pub store: S,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::list::<S>))
        .route("/cart/items", post(routes::cart::add::<S>))
        .route(
            "/cart/items/{listing_id}/decrease",
            post(routes::cart::decrease::<S>),
        )
        .route("/cart/items/{listing_id}", delete(routes::cart::remove::<S>))
        .route("/checkout", post(routes::checkout::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/lines", get(routes::orders::lines::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given store.
pub fn create_default_state<S: MarketStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        cart: CartService::new(store.clone()),
        checkout: CheckoutCoordinator::new(store.clone()),
        orders: OrderQueries::new(store.clone()),
        store,
    })
}
