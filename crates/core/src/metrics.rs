//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Broker connection (connect attempts)
//! - Order intake (submissions, skipped and failed publishes)
//! - Fulfillment (outcomes, processing time)
//! - Consumers and analytics (subscription starts, aggregated completions)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Broker Metrics
// =============================================================================

/// Broker connection attempts by result.
pub static BROKER_CONNECT_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketflow_broker_connect_attempts_total",
            "Total broker connection attempts",
        ),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

// =============================================================================
// Order Intake Metrics
// =============================================================================

/// Orders accepted by event type.
pub static ORDERS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketflow_orders_submitted_total", "Total orders accepted"),
        &["event_type"],
    )
    .unwrap()
});

/// Orders stored without publishing because the broker was not connected.
pub static ORDERS_PUBLISH_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketflow_orders_publish_skipped_total",
        "Orders not queued because the broker was not connected",
    )
    .unwrap()
});

/// Orders whose publish to the order queue failed.
pub static ORDERS_PUBLISH_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketflow_orders_publish_failed_total",
        "Orders whose publish to the order queue failed",
    )
    .unwrap()
});

// =============================================================================
// Fulfillment Metrics
// =============================================================================

/// Order messages handled by the fulfillment worker, by outcome.
pub static FULFILLMENT_MESSAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketflow_fulfillment_messages_total",
            "Order messages handled by the fulfillment worker",
        ),
        &["result"], // "fulfilled", "parse_error", "encode_error", "publish_failed"
    )
    .unwrap()
});

/// Time from receiving an order message to publishing its completion.
pub static FULFILLMENT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "ticketflow_fulfillment_duration_seconds",
            "Duration of order fulfillment",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 30.0]),
    )
    .unwrap()
});

// =============================================================================
// Consumer & Analytics Metrics
// =============================================================================

/// Subscriptions created by consumer name, including restarts.
pub static CONSUMER_STARTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketflow_consumer_starts_total",
            "Queue subscriptions created by the supervisors",
        ),
        &["consumer"],
    )
    .unwrap()
});

/// Completion events folded into the analytics aggregates, by result.
pub static COMPLETIONS_AGGREGATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketflow_completions_aggregated_total",
            "Completion events handled by the analytics consumer",
        ),
        &["result"], // "recorded", "parse_error"
    )
    .unwrap()
});

// =============================================================================
// Registration Helper
// =============================================================================

/// Returns all core metrics for registration with a Prometheus registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Broker
        Box::new(BROKER_CONNECT_ATTEMPTS.clone()),
        // Intake
        Box::new(ORDERS_SUBMITTED.clone()),
        Box::new(ORDERS_PUBLISH_SKIPPED.clone()),
        Box::new(ORDERS_PUBLISH_FAILED.clone()),
        // Fulfillment
        Box::new(FULFILLMENT_MESSAGES.clone()),
        Box::new(FULFILLMENT_DURATION.clone()),
        // Consumers
        Box::new(CONSUMER_STARTS.clone()),
        Box::new(COMPLETIONS_AGGREGATED.clone()),
    ]
}
