//! API server entry point.

use api::config::Config;
use common::{ListingId, Money, ProductId, SellerId};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, Listing, MarketStore, PostgresStore, Product, Seller};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Seeds a small catalog so the in-memory dev server is usable out of the
/// box. Listing ids are logged for driving the API by hand.
fn seed_demo_catalog(store: &InMemoryStore) {
    let acme = Seller {
        id: SellerId::new(),
        name: "Acme Outlet".to_string(),
    };
    let globex = Seller {
        id: SellerId::new(),
        name: "Globex Trading".to_string(),
    };

    let widget = Product {
        id: ProductId::new(),
        name: "Widget".to_string(),
        brand: Some("Acme".to_string()),
        max_buy: Some(5),
    };
    let gadget = Product {
        id: ProductId::new(),
        name: "Gadget".to_string(),
        brand: Some("Globex".to_string()),
        max_buy: None,
    };

    let listings = [
        Listing {
            id: ListingId::new(),
            seller_id: acme.id,
            product_id: widget.id,
            price: Money::from_cents(1999),
            stock: 25,
            active: true,
        },
        Listing {
            id: ListingId::new(),
            seller_id: globex.id,
            product_id: widget.id,
            price: Money::from_cents(1849),
            stock: 8,
            active: true,
        },
        Listing {
            id: ListingId::new(),
            seller_id: globex.id,
            product_id: gadget.id,
            price: Money::from_cents(4500),
            stock: 3,
            active: true,
        },
    ];

    store.add_seller(acme);
    store.add_seller(globex);
    store.add_product(widget);
    store.add_product(gadget);
    for listing in listings {
        tracing::info!(listing_id = %listing.id, price = %listing.price, stock = listing.stock, "seeded demo listing");
        store.add_listing(listing);
    }
}

async fn serve<S: MarketStore + Clone + 'static>(
    store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_default_state(store);

    // Repair any checkout attempts a previous process left unfinished
    // before accepting traffic.
    let report = state
        .checkout
        .recover()
        .await
        .expect("checkout recovery failed");
    if report.committed + report.rolled_back > 0 {
        tracing::info!(
            committed = report.committed,
            rolled_back = report.rolled_back,
            "recovered unfinished checkouts"
        );
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting marketplace API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store backend and run
    let config = Config::from_env();
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresStore::connect(&url)
                .await
                .expect("failed to connect to database");
            store.run_migrations().await.expect("migrations failed");
            serve(store, &config, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store with demo catalog");
            let store = InMemoryStore::new();
            seed_demo_catalog(&store);
            serve(store, &config, metrics_handle).await;
        }
    }
}
