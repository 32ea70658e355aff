//! Route definitions for the REST API.

mod deliveries;
mod health;
mod history;
mod orders;
mod transactions;
mod zones;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Orders
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route(
            "/orders/:id",
            get(orders::get_order)
                .put(orders::update_order)
                .delete(orders::delete_order),
        )
        .route("/orders/:id/history", get(orders::order_history))
        .route("/orders/:id/history/latest", get(orders::order_latest))
        .route("/orders/:id/history/:version", get(orders::order_version))
        // Deliveries
        .route(
            "/deliveries",
            get(deliveries::list_deliveries).post(deliveries::create_delivery),
        )
        .route(
            "/deliveries/:id",
            get(deliveries::get_delivery)
                .put(deliveries::update_delivery)
                .delete(deliveries::delete_delivery),
        )
        .route("/deliveries/:id/history", get(deliveries::delivery_history))
        .route("/deliveries/:id/history/latest", get(deliveries::delivery_latest))
        .route(
            "/deliveries/:id/history/:version",
            get(deliveries::delivery_version),
        )
        // Zones
        .route("/zones", get(zones::list_zones).post(zones::create_zone))
        .route(
            "/zones/:id",
            get(zones::get_zone)
                .put(zones::update_zone)
                .delete(zones::delete_zone),
        )
        // Units of work
        .route("/transactions/:id", get(transactions::get_transaction))
        // Attach state
        .with_state(state)
}

pub use deliveries::*;
pub use health::*;
pub use orders::*;
pub use transactions::*;
pub use zones::*;
