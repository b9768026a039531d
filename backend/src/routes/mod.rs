//! Route definitions for the fresh-produce inventory API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/products", product_routes())
        .nest("/stock", stock_routes())
        .nest("/batches", batch_routes())
        .nest("/reports", report_routes())
        .route("/audit", get(handlers::run_audit))
}

/// Product catalog and per-product stock routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:product_id",
            get(handlers::get_product).put(handlers::update_product),
        )
        .route(
            "/:product_id/stock",
            get(handlers::get_stock).post(handlers::update_stock),
        )
        .route("/:product_id/batches", get(handlers::list_batches))
        .route("/:product_id/history", get(handlers::get_history))
}

/// Directional stock change routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/increase", post(handlers::increase_stock))
        .route("/decrease", post(handlers::decrease_stock))
        .route("/set", post(handlers::set_stock))
}

/// Batch expiry routes
fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/expiring", get(handlers::list_expiring_batches))
        .route("/expired", get(handlers::list_expired_batches))
}

/// Reporting routes
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/low-stock", get(handlers::list_low_stock))
        .route("/losses", get(handlers::get_loss_report))
}
