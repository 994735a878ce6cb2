//! Analytics queue consumer and periodic report.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::aggregator::AnalyticsAggregator;
use crate::broker::{Delivery, DeliveryHandler};
use crate::metrics;
use crate::order::CompletionEvent;

/// Feeds completion events from the analytics queue into the aggregator.
pub struct AnalyticsConsumer {
    aggregator: Arc<AnalyticsAggregator>,
}

impl AnalyticsConsumer {
    pub fn new(aggregator: Arc<AnalyticsAggregator>) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl DeliveryHandler for AnalyticsConsumer {
    fn name(&self) -> &str {
        "analytics"
    }

    async fn handle(&self, delivery: Delivery) {
        let event: CompletionEvent = match serde_json::from_slice(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                metrics::COMPLETIONS_AGGREGATED
                    .with_label_values(&["parse_error"])
                    .inc();
                warn!("Malformed completion event, requeueing: {}", e);
                if let Err(nack_err) = delivery.nack(true).await {
                    error!("Failed to nack completion event: {}", nack_err);
                }
                return;
            }
        };

        self.aggregator.record(&event);
        metrics::COMPLETIONS_AGGREGATED
            .with_label_values(&["recorded"])
            .inc();
        debug!(
            "Analytics: {}x {} ticket(s) for {}",
            event.quantity, event.event_type, event.customer
        );

        if let Err(e) = delivery.ack().await {
            error!("Failed to ack completion event #{}: {}", event.order_id, e);
        }
    }
}

/// Log the aggregator report every `interval` until shutdown.
pub fn spawn_report_loop(
    aggregator: Arc<AnalyticsAggregator>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Analytics report loop started (every {:?})", interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Analytics report loop received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    aggregator.log_report();
                }
            }
        }
    })
}
