use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{analytics, handlers, middleware::metrics_middleware, orders};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health, keep-alive and config
        .route("/health", get(handlers::health))
        .route("/ping", get(handlers::ping))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Orders
        .route("/order", post(orders::create_order))
        .route("/orders", get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/customer/{name}", get(orders::list_customer_orders))
        // Events and analytics
        .route("/events", get(orders::list_events))
        .route("/events/{event_type}", get(analytics::get_event_stats))
        .route("/stats", get(analytics::get_stats))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
