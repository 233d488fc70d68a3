//! Brew club orders service
//!
//! Members fill a session cart from the grain and hop catalogs and check it
//! out as an order. Staff aggregate outstanding order items into one pending
//! purchase order per supplier, export those as CSV and import catalog
//! ingredients from CSV.

pub mod aggregation;
pub mod backend;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod csv_export;
pub mod csv_import;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod session;
pub mod storage;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::{Config, StorageBackend};
pub use handlers::AppState;
pub use notifier::{LogNotifier, Notifier, RelayNotifier};
pub use storage::Storage;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/sessions", post(handlers::create_session_handler))
        // Catalog
        .route(
            "/api/suppliers",
            get(handlers::list_suppliers_handler).post(handlers::create_supplier_handler),
        )
        .route("/api/ingredients", post(handlers::create_ingredient_handler))
        .route("/api/ingredients/{id}", get(handlers::get_ingredient_handler))
        // Ordering
        .route("/api/orders/cart", get(handlers::cart_handler))
        .route("/api/orders/cart/delete", post(handlers::cart_delete_handler))
        .route("/api/orders/review", post(handlers::review_handler))
        .route("/api/orders/checkout", post(handlers::checkout_handler))
        .route(
            "/api/orders/{key}",
            get(handlers::order_page_handler).post(handlers::add_to_cart_handler),
        )
        // Supplier orders
        .route(
            "/api/supplier-orders",
            get(handlers::list_supplier_orders_handler)
                .post(handlers::create_supplier_order_handler),
        )
        .route(
            "/api/supplier-orders/{id}",
            get(handlers::get_supplier_order_handler),
        )
        .route(
            "/api/supplier-orders/{id}/status",
            put(handlers::update_supplier_order_status_handler),
        )
        .route(
            "/api/supplier-orders/{id}/csv",
            get(handlers::export_supplier_order_handler),
        )
        // Import
        .route(
            "/api/import/{model}",
            get(handlers::import_format_handler).post(handlers::import_handler),
        )
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
