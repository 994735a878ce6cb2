//! Analytics API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use ticketflow_core::StatsReport;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AnalyticsErrorResponse {
    pub error: String,
}

/// Running totals, per-event breakdown and the latest completed orders
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsReport> {
    // Stats come from the analytics consumer; wake its keep-alive loop
    state.request_checks();
    Json(state.aggregator().stats_report())
}

/// Totals and latest completed orders for one event type
pub async fn get_event_stats(
    State(state): State<Arc<AppState>>,
    Path(event_type): Path<String>,
) -> Response {
    state.request_checks();
    match state.aggregator().event_report(&event_type) {
        Some(report) => Json(report).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(AnalyticsErrorResponse {
                error: "Event type not found".to_string(),
            }),
        )
            .into_response(),
    }
}
