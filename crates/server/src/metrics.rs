//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the ticketflow server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Broker and consumer status (collected dynamically)
//! - Order and analytics totals (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketflow_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketflow_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketflow_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Status (collected dynamically)
// =============================================================================

/// Broker connection state (1 = connected, 0 = not connected).
pub static BROKER_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketflow_broker_connected",
        "Whether the broker connection is established (1) or not (0)",
    )
    .unwrap()
});

/// Consumer subscription state by consumer name.
pub static CONSUMERS_RUNNING: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "ticketflow_consumer_running",
            "Whether the consumer is subscribed (1) or not (0)",
        ),
        &["consumer"],
    )
    .unwrap()
});

/// Orders held in memory.
pub static ORDERS_STORED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("ticketflow_orders_stored", "Orders held by the intake").unwrap()
});

/// Tickets counted by the analytics stage.
pub static TICKETS_AGGREGATED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketflow_tickets_aggregated",
        "Tickets counted by the analytics stage",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let server_metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        // Pipeline status
        Box::new(BROKER_CONNECTED.clone()),
        Box::new(CONSUMERS_RUNNING.clone()),
        Box::new(ORDERS_STORED.clone()),
        Box::new(TICKETS_AGGREGATED.clone()),
    ];

    // Core metrics (broker, intake, fulfillment, consumers)
    let all = server_metrics
        .into_iter()
        .chain(ticketflow_core::metrics::all_metrics());

    for metric in all {
        if let Err(e) = registry.register(metric) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values
/// from the broker connection, supervisors, intake and aggregator.
pub async fn collect_dynamic_metrics(state: &AppState) {
    BROKER_CONNECTED.set(i64::from(state.connection().is_connected()));

    for status in state.consumer_statuses().await {
        CONSUMERS_RUNNING
            .with_label_values(&[&status.name])
            .set(i64::from(status.running));
    }

    ORDERS_STORED.set(state.intake().order_count() as i64);
    TICKETS_AGGREGATED.set(state.aggregator().total_tickets() as i64);
}

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());
static CUSTOMER_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/orders/customer/[^/]+").unwrap());
static EVENT_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/events/[^/]+").unwrap());

/// Normalize a path for metric labels (replace ids and names with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = CUSTOMER_SEGMENT.replace(path, "/orders/customer/{name}");
    let result = EVENT_SEGMENT.replace(&result, "/events/{event_type}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/orders/12345"), "/orders/{id}");
    }

    #[test]
    fn test_normalize_path_customer() {
        assert_eq!(
            normalize_path("/orders/customer/Ann%20Lee"),
            "/orders/customer/{name}"
        );
    }

    #[test]
    fn test_normalize_path_event() {
        assert_eq!(normalize_path("/events/concert"), "/events/{event_type}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/stats"), "/stats");
        assert_eq!(normalize_path("/events"), "/events");
        assert_eq!(normalize_path("/orders"), "/orders");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("ticketflow_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Prometheus only outputs metrics that have been accessed
        ticketflow_core::metrics::ORDERS_SUBMITTED
            .with_label_values(&["movie"])
            .inc_by(0);
        ticketflow_core::metrics::ORDERS_PUBLISH_SKIPPED.inc_by(0);
        BROKER_CONNECTED.set(0);
        ORDERS_STORED.set(0);

        let output = encode_metrics();

        assert!(output.contains("ticketflow_orders_submitted_total"));
        assert!(output.contains("ticketflow_orders_publish_skipped_total"));
        assert!(output.contains("ticketflow_broker_connected"));
        assert!(output.contains("ticketflow_orders_stored"));
    }
}
