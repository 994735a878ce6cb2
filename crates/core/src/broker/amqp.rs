//! RabbitMQ adapter built on lapin.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    acker::Acker,
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
        BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tracing::{debug, info};

use super::connection::Connector;
use super::types::{Acknowledge, Broker, BrokerError, Delivery, DeliveryStream};

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

/// Opens a lapin connection and a confirm-mode channel per attempt.
pub struct AmqpConnector {
    url: String,
    prefetch: u16,
}

impl AmqpConnector {
    pub fn new(url: impl Into<String>, prefetch: u16) -> Self {
        Self {
            url: url.into(),
            prefetch,
        }
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    async fn connect(&self) -> Result<Arc<dyn Broker>, BrokerError> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to connect to RabbitMQ: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to create channel: {e}")))?;

        // Publisher confirms: publish() returns only once the broker took the message
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to enable confirms: {e}")))?;

        if self.prefetch > 0 {
            channel
                .basic_qos(self.prefetch, BasicQosOptions::default())
                .await
                .map_err(|e| BrokerError::Connection(format!("Failed to set prefetch: {e}")))?;
        }

        info!("Opened AMQP channel (prefetch {})", self.prefetch);

        Ok(Arc::new(AmqpBroker {
            connection,
            channel,
        }))
    }
}

/// Broker backed by a single lapin channel.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Declare {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Declared durable queue '{}'", queue);
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let publish_err = |reason: String| BrokerError::Publish {
            queue: queue.to_string(),
            reason,
        };

        let confirm = self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(PERSISTENT)
                    .with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| publish_err(e.to_string()))?;

        let confirmation = confirm.await.map_err(|e| publish_err(e.to_string()))?;
        if confirmation.is_nack() {
            return Err(publish_err("broker rejected the message".to_string()));
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Subscribe {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        let stream = consumer.map(|item| {
            item.map(|delivery| {
                Delivery::new(
                    delivery.data,
                    delivery.redelivered,
                    Box::new(AmqpAcker(delivery.acker)),
                )
            })
            .map_err(|e| BrokerError::Consume(e.to_string()))
        });
        Ok(stream.boxed())
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), BrokerError> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(|e| BrokerError::Consume(format!("Failed to cancel {consumer_tag}: {e}")))
    }

    fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                ..Default::default()
            })
            .await
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))
    }
}
