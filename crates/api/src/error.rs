//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart::CartError;
use checkout::CheckoutError;
use orders::OrdersError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Cart operation error.
    Cart(CartError),
    /// Checkout error.
    Checkout(CheckoutError),
    /// Order query error.
    Orders(OrdersError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(&msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(&msg)),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Orders(err) => orders_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("internal server error"),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn store_error_to_response(err: StoreError) -> (StatusCode, serde_json::Value) {
    match &err {
        StoreError::ListingNotFound(_)
        | StoreError::LineNotFound(_)
        | StoreError::OrderNotFound(_) => (StatusCode::NOT_FOUND, error_body(&err.to_string())),
        StoreError::InsufficientStock { listing_id, .. } => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": err.to_string(), "listing_id": listing_id }),
        ),
        _ => {
            tracing::error!(error = %err, "store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("internal server error"),
            )
        }
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, serde_json::Value) {
    match err {
        CartError::ListingNotFound(_) | CartError::LineNotFound(_) => {
            (StatusCode::NOT_FOUND, error_body(&err.to_string()))
        }
        CartError::OutOfStock(listing_id) => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": err.to_string(), "listing_id": listing_id }),
        ),
        CartError::InvalidQuantity => (StatusCode::BAD_REQUEST, error_body(&err.to_string())),
        CartError::Store(store_err) => store_error_to_response(store_err),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, serde_json::Value) {
    match err {
        CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, error_body(&err.to_string())),
        CheckoutError::InsufficientStock(listing_id) => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": err.to_string(), "listing_id": listing_id }),
        ),
        CheckoutError::Store(store_err) => store_error_to_response(store_err),
    }
}

fn orders_error_to_response(err: OrdersError) -> (StatusCode, serde_json::Value) {
    match err {
        OrdersError::NotFound(_) => (StatusCode::NOT_FOUND, error_body(&err.to_string())),
        OrdersError::Store(store_err) => store_error_to_response(store_err),
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<OrdersError> for ApiError {
    fn from(err: OrdersError) -> Self {
        ApiError::Orders(err)
    }
}
