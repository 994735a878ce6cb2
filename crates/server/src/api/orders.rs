//! Order API handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use ticketflow_core::{EventType, IntakeError, Order};

use crate::state::AppState;

/// Orders returned by the list endpoint, newest first.
const LIST_LIMIT: usize = 50;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for placing an order
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    #[serde(default, alias = "event")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    /// Defaults to 1
    #[serde(default)]
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: u64,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ListOrdersResponse {
    pub total: usize,
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerOrdersResponse {
    pub customer: String,
    pub total_orders: usize,
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<&'static str>,
    pub description: BTreeMap<&'static str, &'static str>,
}

/// Error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_events: Option<Vec<&'static str>>,
}

impl OrderErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            valid_events: None,
        }
    }
}

/// Order request rejection rendered as a 400.
pub enum OrderRejection {
    /// Body missing, not JSON, or with fields of the wrong type.
    Body(JsonRejection),
    Intake(IntakeError),
}

impl IntoResponse for OrderRejection {
    fn into_response(self) -> Response {
        let body = match self {
            OrderRejection::Body(rejection) => OrderErrorResponse::new(format!(
                "Invalid request body: {}",
                rejection.body_text()
            )),
            OrderRejection::Intake(IntakeError::InvalidEventType { valid, .. }) => {
                OrderErrorResponse {
                    error: "Invalid event type".to_string(),
                    valid_events: Some(valid),
                }
            }
            OrderRejection::Intake(other) => OrderErrorResponse::new(other.to_string()),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(OrderErrorResponse::new("Order not found")),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// Place a ticket order
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateOrderBody>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, OrderRejection> {
    let Json(body) = body.map_err(OrderRejection::Body)?;
    let event_type = body.event_type.unwrap_or_default();
    let customer = body.customer.unwrap_or_default();
    let quantity = body.quantity.unwrap_or(1);

    let order = state
        .intake()
        .submit_order(&event_type, &customer, quantity)
        .await
        .map_err(OrderRejection::Intake)?;

    // Wake the keep-alive loops so a dropped consumer picks the order up
    state.request_checks();

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        status: "processing".to_string(),
        message: format!("Your {} ticket order is being processed!", order.event_type),
    }))
}

/// List the most recent orders
pub async fn list_orders(State(state): State<Arc<AppState>>) -> Json<ListOrdersResponse> {
    let intake = state.intake();
    Json(ListOrdersResponse {
        total: intake.order_count(),
        orders: intake.latest_orders(LIST_LIMIT),
    })
}

/// Get an order by id
pub async fn get_order(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match id.parse::<u64>().ok().and_then(|id| state.intake().get_order(id)) {
        Some(order) => Json(order).into_response(),
        None => not_found(),
    }
}

/// List the orders of one customer (case-insensitive)
pub async fn list_customer_orders(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<CustomerOrdersResponse> {
    let orders = state.intake().list_orders_by_customer(&name);
    Json(CustomerOrdersResponse {
        customer: name,
        total_orders: orders.len(),
        orders,
    })
}

/// List the valid event types
pub async fn list_events() -> Json<EventsResponse> {
    Json(EventsResponse {
        events: EventType::names(),
        description: EventType::ALL
            .iter()
            .map(|t| (t.as_str(), t.description()))
            .collect(),
    })
}
