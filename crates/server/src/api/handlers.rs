use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use ticketflow_core::{ConnectionState, ConsumerStatus, EnsureOutcome, SanitizedConfig};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub broker: ConnectionState,
    pub consumers: Vec<ConsumerStatus>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "ticketflow".to_string(),
        broker: state.connection().state(),
        consumers: state.consumer_statuses().await,
    })
}

#[derive(Serialize)]
pub struct PingResponse {
    pub status: String,
    pub consumers: Vec<PingResult>,
}

#[derive(Serialize)]
pub struct PingResult {
    pub name: String,
    /// "already_running", "started" or "error"
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run the consumer keep-alive check now and report what it did.
pub async fn ping(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut consumers = Vec::new();
    for supervisor in state.supervisors() {
        let name = supervisor.name().to_string();
        let result = match supervisor.ensure_running().await {
            Ok(EnsureOutcome::AlreadyRunning { tag }) => PingResult {
                name,
                result: "already_running".to_string(),
                tag: Some(tag),
                error: None,
            },
            Ok(EnsureOutcome::Started { tag }) => PingResult {
                name,
                result: "started".to_string(),
                tag: Some(tag),
                error: None,
            },
            Err(e) => PingResult {
                name,
                result: "error".to_string(),
                tag: None,
                error: Some(e.to_string()),
            },
        };
        consumers.push(result);
    }

    let healthy = consumers.iter().all(|c| c.result != "error");
    let (code, status) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(PingResponse {
            status: status.to_string(),
            consumers,
        }),
    )
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
