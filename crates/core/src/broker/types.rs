//! Broker-facing traits and types.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use thiserror::Error;

/// Durable queue carrying new orders from the intake to the fulfillment worker.
pub const ORDER_QUEUE: &str = "ticket-order";

/// Durable queue carrying completion events to the analytics stage.
pub const ANALYTICS_QUEUE: &str = "analytics";

/// Queues provisioned on every successful connect.
pub const REQUIRED_QUEUES: [&str; 2] = [ORDER_QUEUE, ANALYTICS_QUEUE];

/// Errors from broker operations.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Connect retry budget exhausted.
    #[error("broker unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    /// No connection has been established yet.
    #[error("broker not connected")]
    NotConnected,

    /// Single connection attempt failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Queue declaration failed.
    #[error("failed to declare queue {queue}: {reason}")]
    Declare { queue: String, reason: String },

    /// Publish was rejected or could not be sent.
    #[error("failed to publish to {queue}: {reason}")]
    Publish { queue: String, reason: String },

    /// Consumer subscription failed.
    #[error("failed to subscribe to {queue}: {reason}")]
    Subscribe { queue: String, reason: String },

    /// Ack or nack could not be delivered.
    #[error("acknowledgment failed: {0}")]
    Acknowledge(String),

    /// Delivery stream reported an error.
    #[error("consumer error: {0}")]
    Consume(String),
}

/// Stream of deliveries for one subscription. Ends when the subscription is
/// cancelled or the underlying channel goes away.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// A durable message broker.
///
/// Every publish is persistent. Consumers use manual acknowledgment.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare a durable queue. Declaring an existing queue is a no-op.
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;

    /// Publish a persistent message to a queue.
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Start consuming a queue under the given consumer tag.
    async fn subscribe(&self, queue: &str, consumer_tag: &str)
        -> Result<DeliveryStream, BrokerError>;

    /// Cancel a subscription. Its stream ends.
    async fn cancel(&self, consumer_tag: &str) -> Result<(), BrokerError>;

    /// Whether the connection is currently usable.
    fn is_connected(&self) -> bool;
}

/// Acknowledgment channel back to the broker for one delivery.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// A message handed to a consumer. Must be acked or nacked exactly once.
pub struct Delivery {
    pub payload: Vec<u8>,
    /// Set when the broker has delivered this message before.
    pub redelivered: bool,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, redelivered: bool, acker: Box<dyn Acknowledge>) -> Self {
        Self {
            payload,
            redelivered,
            acker,
        }
    }

    /// Remove the message from its queue.
    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    /// Reject the message, optionally putting it back for redelivery.
    pub async fn nack(self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Processes deliveries for a supervised subscription.
///
/// The handler owns the acknowledgment decision for every delivery it receives.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &str;

    async fn handle(&self, delivery: Delivery);
}
