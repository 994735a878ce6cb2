//! Order queue consumer that fulfills orders and reports completions.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use super::config::FulfillmentConfig;
use crate::broker::{BrokerConnection, BrokerError, Delivery, DeliveryHandler, ANALYTICS_QUEUE};
use crate::metrics;
use crate::order::{CompletionEvent, OrderMessage};

/// Errors while fulfilling one order message.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Payload is not a valid order message.
    #[error("malformed order message: {0}")]
    Parse(#[source] serde_json::Error),

    /// Completion event could not be serialized.
    #[error("failed to encode completion event: {0}")]
    Encode(#[source] serde_json::Error),

    /// Completion event could not be published to the analytics queue.
    #[error("failed to publish completion: {0}")]
    Publish(#[source] BrokerError),
}

impl FulfillmentError {
    fn outcome(&self) -> &'static str {
        match self {
            FulfillmentError::Parse(_) => "parse_error",
            FulfillmentError::Encode(_) => "encode_error",
            FulfillmentError::Publish(_) => "publish_failed",
        }
    }
}

/// Processes one order message at a time per delivery:
/// parse, simulated work, publish completion, then acknowledge.
///
/// Any failure nacks with requeue so the broker delivers the order again.
/// A crash between publish and ack can therefore produce a duplicate
/// completion, never a lost one.
pub struct FulfillmentWorker {
    connection: Arc<BrokerConnection>,
    config: FulfillmentConfig,
}

impl FulfillmentWorker {
    pub fn new(connection: Arc<BrokerConnection>, config: FulfillmentConfig) -> Self {
        Self { connection, config }
    }

    /// Fulfill one order payload and publish its completion event.
    pub async fn process(&self, payload: &[u8]) -> Result<CompletionEvent, FulfillmentError> {
        let order: OrderMessage = serde_json::from_slice(payload).map_err(FulfillmentError::Parse)?;

        info!(
            "Processing ticket order #{}: {}x {} for {}",
            order.id, order.quantity, order.event_type, order.customer
        );

        tokio::time::sleep(self.config.processing_time(&order.event_type)).await;

        let completion = CompletionEvent::for_order(&order);
        let body = serde_json::to_vec(&completion).map_err(FulfillmentError::Encode)?;

        let broker = self
            .connection
            .broker()
            .ok_or(FulfillmentError::Publish(BrokerError::NotConnected))?;
        broker
            .publish(ANALYTICS_QUEUE, &body)
            .await
            .map_err(FulfillmentError::Publish)?;

        info!(
            "Fulfilled order #{}: {}x {} ticket(s) for {}",
            order.id, order.quantity, order.event_type, order.customer
        );
        Ok(completion)
    }
}

#[async_trait]
impl DeliveryHandler for FulfillmentWorker {
    fn name(&self) -> &str {
        "fulfillment"
    }

    async fn handle(&self, delivery: Delivery) {
        let started = Instant::now();
        let result = self.process(&delivery.payload).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(_) => {
                metrics::FULFILLMENT_MESSAGES
                    .with_label_values(&["fulfilled"])
                    .inc();
                metrics::FULFILLMENT_DURATION.observe(elapsed);
                if let Err(e) = delivery.ack().await {
                    // Broker will redeliver; the completion may be counted twice
                    error!("Failed to ack fulfilled order: {}", e);
                }
            }
            Err(e) => {
                metrics::FULFILLMENT_MESSAGES
                    .with_label_values(&[e.outcome()])
                    .inc();
                warn!(
                    "Fulfillment failed (redelivered: {}), requeueing: {}",
                    delivery.redelivered, e
                );
                if let Err(nack_err) = delivery.nack(true).await {
                    error!("Failed to nack order message: {}", nack_err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Broker, ORDER_QUEUE};
    use crate::testing::{fixtures, MemoryBroker};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_process_publishes_completion() {
        let broker = MemoryBroker::new();
        let connection = fixtures::connected(&broker).await;
        let worker = FulfillmentWorker::new(connection, fixtures::instant_fulfillment());

        let payload = serde_json::to_vec(&fixtures::order_message(5, "game", "Ann", 3)).unwrap();
        let completion = worker.process(&payload).await.unwrap();

        assert_eq!(completion.order_id, 5);
        assert_eq!(completion.event_type, "game");
        assert_eq!(completion.customer, "Ann");
        assert_eq!(completion.quantity, 3);

        let published = broker.published_json(ANALYTICS_QUEUE);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["id"], 5);
        assert_eq!(published[0]["eventType"], "game");
    }

    #[tokio::test]
    async fn test_process_rejects_malformed_payload() {
        let broker = MemoryBroker::new();
        let connection = fixtures::connected(&broker).await;
        let worker = FulfillmentWorker::new(connection, fixtures::instant_fulfillment());

        let err = worker.process(b"not json").await.unwrap_err();

        assert!(matches!(err, FulfillmentError::Parse(_)));
        assert!(broker.published(ANALYTICS_QUEUE).is_empty());
    }

    #[tokio::test]
    async fn test_process_without_connection_fails_publish() {
        let broker = MemoryBroker::new();
        let connection = fixtures::connection(&broker);
        let worker = FulfillmentWorker::new(connection, fixtures::instant_fulfillment());

        let payload = serde_json::to_vec(&fixtures::order_message(1, "movie", "Ann", 1)).unwrap();
        let err = worker.process(&payload).await.unwrap_err();

        assert!(matches!(
            err,
            FulfillmentError::Publish(BrokerError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_handle_acks_after_publish() {
        let broker = MemoryBroker::new();
        let connection = fixtures::connected(&broker).await;
        let worker = FulfillmentWorker::new(connection, fixtures::instant_fulfillment());

        let payload = serde_json::to_vec(&fixtures::order_message(1, "movie", "Ann", 2)).unwrap();
        broker.publish(ORDER_QUEUE, &payload).await.unwrap();
        let mut stream = broker.subscribe(ORDER_QUEUE, "test").await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();

        worker.handle(delivery).await;

        assert_eq!(broker.unacked_count(ORDER_QUEUE), 0);
        assert_eq!(broker.ready_count(ORDER_QUEUE), 0);
        assert_eq!(broker.published(ANALYTICS_QUEUE).len(), 1);
    }

    #[tokio::test]
    async fn test_handle_requeues_when_publish_fails() {
        let broker = MemoryBroker::new();
        let connection = fixtures::connected(&broker).await;
        let worker = FulfillmentWorker::new(connection, fixtures::instant_fulfillment());

        let payload = serde_json::to_vec(&fixtures::order_message(9, "sports", "Dan", 1)).unwrap();
        broker.publish(ORDER_QUEUE, &payload).await.unwrap();
        broker.fail_next_publishes(ANALYTICS_QUEUE, 1);

        let mut stream = broker.subscribe(ORDER_QUEUE, "test").await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        worker.handle(delivery).await;

        // Not acknowledged: the same order comes back
        let redelivered = stream.next().await.unwrap().unwrap();
        assert!(redelivered.redelivered);
        assert_eq!(redelivered.payload, payload);
        assert!(broker.published(ANALYTICS_QUEUE).is_empty());

        worker.handle(redelivered).await;
        assert_eq!(broker.published(ANALYTICS_QUEUE).len(), 1);
        assert_eq!(broker.unacked_count(ORDER_QUEUE), 0);
    }

    #[tokio::test]
    async fn test_handle_requeues_malformed_message() {
        let broker = MemoryBroker::new();
        let connection = fixtures::connected(&broker).await;
        let worker = FulfillmentWorker::new(connection, fixtures::instant_fulfillment());

        broker.publish(ORDER_QUEUE, b"{broken").await.unwrap();
        let mut stream = broker.subscribe(ORDER_QUEUE, "test").await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        worker.handle(delivery).await;

        let again = stream.next().await.unwrap().unwrap();
        assert_eq!(again.payload, b"{broken");
        assert!(again.redelivered);
    }
}
