//! Route definitions for the Apparel Wholesale Platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Product catalog
        .nest("/products", product_routes())
        // Purchase orders
        .nest("/orders", order_routes())
}

/// Product catalog routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:product_id",
            get(handlers::get_product).put(handlers::update_product),
        )
        .route(
            "/:product_id/inventory",
            get(handlers::get_inventory).put(handlers::replace_inventory),
        )
        .route(
            "/:product_id/reallocate",
            post(handlers::reallocate_product),
        )
}

/// Purchase order routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route(
            "/:order_id",
            get(handlers::get_order).put(handlers::update_order),
        )
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route("/:order_id/ship", post(handlers::confirm_shipment))
}
