//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{ListingId, Money, ProductId, SellerId, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, Listing, Product, Seller, StockLedger};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = api::create_default_state(store.clone());
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

fn seed_listing(
    store: &InMemoryStore,
    stock: u32,
    max_buy: Option<u32>,
    price_cents: i64,
) -> ListingId {
    let product = Product {
        id: ProductId::new(),
        name: "Widget".to_string(),
        brand: Some("Acme".to_string()),
        max_buy,
    };
    let seller = Seller {
        id: SellerId::new(),
        name: "Acme Store".to_string(),
    };
    let listing = Listing {
        id: ListingId::new(),
        seller_id: seller.id,
        product_id: product.id,
        price: Money::from_cents(price_cents),
        stock,
        active: true,
    };
    let listing_id = listing.id;
    store.add_product(product);
    store.add_seller(seller);
    store.add_listing(listing);
    listing_id
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    user_id: Option<UserId>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("x-user-id", user_id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn add_to_cart(
    app: &Router,
    user_id: UserId,
    listing_id: ListingId,
    quantity: u32,
) -> (StatusCode, serde_json::Value) {
    request(
        app,
        "POST",
        "/cart/items",
        Some(user_id),
        Some(serde_json::json!({
            "listing_id": listing_id.as_uuid(),
            "quantity": quantity,
        })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = request(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_add_to_cart() {
    let (app, store) = setup();
    let user_id = UserId::new();
    let listing_id = seed_listing(&store, 10, None, 1000);

    let (status, json) = add_to_cart(&app, user_id, listing_id, 2).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quantity"], 2);
    assert_eq!(json["clamped"], false);
    assert_eq!(json["listing_id"], listing_id.to_string());
}

#[tokio::test]
async fn test_add_to_cart_clamps_and_reports() {
    let (app, store) = setup();
    let user_id = UserId::new();
    let listing_id = seed_listing(&store, 10, Some(5), 1000);

    add_to_cart(&app, user_id, listing_id, 3).await;
    let (status, json) = add_to_cart(&app, user_id, listing_id, 4).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quantity"], 5);
    assert_eq!(json["clamped"], true);
}

#[tokio::test]
async fn test_add_unknown_listing_is_not_found() {
    let (app, _) = setup();

    let (status, json) = add_to_cart(&app, UserId::new(), ListingId::new(), 1).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_add_requires_identity_header() {
    let (app, store) = setup();
    let listing_id = seed_listing(&store, 10, None, 1000);

    let (status, json) = request(
        &app,
        "POST",
        "/cart/items",
        None,
        Some(serde_json::json!({
            "listing_id": listing_id.as_uuid(),
            "quantity": 1,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("X-User-Id"));
}

#[tokio::test]
async fn test_add_zero_quantity_rejected() {
    let (app, store) = setup();
    let listing_id = seed_listing(&store, 10, None, 1000);

    let (status, _) = add_to_cart(&app, UserId::new(), listing_id, 0).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_exhausted_listing_conflicts() {
    let (app, store) = setup();
    let listing_id = seed_listing(&store, 0, None, 1000);

    let (status, json) = add_to_cart(&app, UserId::new(), listing_id, 1).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["listing_id"], listing_id.to_string());
}

#[tokio::test]
async fn test_list_cart_with_display_data() {
    let (app, store) = setup();
    let user_id = UserId::new();
    let listing_id = seed_listing(&store, 10, None, 1250);
    add_to_cart(&app, user_id, listing_id, 2).await;

    let (status, json) = request(&app, "GET", "/cart", Some(user_id), None).await;

    assert_eq!(status, StatusCode::OK);
    let lines = json.as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 2);
    assert_eq!(lines[0]["unit_price_cents"], 1250);
    assert_eq!(lines[0]["subtotal_cents"], 2500);
    assert_eq!(lines[0]["product_name"], "Widget");
    assert_eq!(lines[0]["seller_name"], "Acme Store");
    assert_eq!(lines[0]["in_stock"], true);
}

#[tokio::test]
async fn test_decrease_and_remove() {
    let (app, store) = setup();
    let user_id = UserId::new();
    let listing_id = seed_listing(&store, 10, None, 1000);
    add_to_cart(&app, user_id, listing_id, 2).await;

    let uri = format!("/cart/items/{listing_id}/decrease");
    let (status, json) = request(&app, "POST", &uri, Some(user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], false);
    assert_eq!(json["quantity"], 1);

    let (status, json) = request(&app, "POST", &uri, Some(user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);

    // Removing again: the line is gone.
    let uri = format!("/cart/items/{listing_id}");
    let (status, _) = request(&app, "DELETE", &uri, Some(user_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_line() {
    let (app, store) = setup();
    let user_id = UserId::new();
    let listing_id = seed_listing(&store, 10, None, 1000);
    add_to_cart(&app, user_id, listing_id, 2).await;

    let uri = format!("/cart/items/{listing_id}");
    let (status, json) = request(&app, "DELETE", &uri, Some(user_id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);

    let (_, cart) = request(&app, "GET", "/cart", Some(user_id), None).await;
    assert!(cart.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let (app, _) = setup();

    let (status, json) = request(&app, "POST", "/checkout", Some(UserId::new()), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_checkout_flow() {
    let (app, store) = setup();
    let user_id = UserId::new();
    let a = seed_listing(&store, 10, None, 1000);
    let b = seed_listing(&store, 4, None, 2500);
    add_to_cart(&app, user_id, a, 2).await;
    add_to_cart(&app, user_id, b, 1).await;

    let (status, placed) = request(&app, "POST", "/checkout", Some(user_id), None).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(placed["total_cents"], 4500);
    assert_eq!(placed["status"], "pending");
    assert_eq!(placed["lines"].as_array().unwrap().len(), 2);

    // Stock moved, cart cleared.
    assert_eq!(store.stock_of(a).unwrap(), 8);
    assert_eq!(store.stock_of(b).unwrap(), 3);
    let (_, cart) = request(&app, "GET", "/cart", Some(user_id), None).await;
    assert!(cart.as_array().unwrap().is_empty());

    // The order is visible in the projections.
    let (status, orders) = request(&app, "GET", "/orders", Some(user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap().clone();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], placed["order_id"]);

    let uri = format!("/orders/{}/lines", placed["order_id"].as_str().unwrap());
    let (status, lines) = request(&app, "GET", &uri, Some(user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_checkout_insufficient_stock() {
    let (app, store) = setup();
    let user_id = UserId::new();
    let listing_id = seed_listing(&store, 5, None, 1000);
    add_to_cart(&app, user_id, listing_id, 3).await;

    // A competing checkout takes most of the stock first.
    store.reserve(listing_id, 4).await.unwrap();

    let (status, json) = request(&app, "POST", "/checkout", Some(user_id), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["listing_id"], listing_id.to_string());

    // Nothing changed: stock as the competitor left it, cart intact.
    assert_eq!(store.stock_of(listing_id).unwrap(), 1);
    let (_, cart) = request(&app, "GET", "/cart", Some(user_id), None).await;
    assert_eq!(cart.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_orders_are_scoped_to_owner() {
    let (app, store) = setup();
    let owner = UserId::new();
    let listing_id = seed_listing(&store, 10, None, 1000);
    add_to_cart(&app, owner, listing_id, 1).await;
    let (_, placed) = request(&app, "POST", "/checkout", Some(owner), None).await;
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let other = UserId::new();

    let uri = format!("/orders/{order_id}");
    let (status, _) = request(&app, "GET", &uri, Some(other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/orders/{order_id}/lines");
    let (status, _) = request(&app, "GET", &uri, Some(other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, orders) = request(&app, "GET", "/orders", Some(other), None).await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
