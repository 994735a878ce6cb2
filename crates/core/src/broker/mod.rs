//! Message broker access: durable queues, persistent publish, manual ack.
//!
//! - [`Broker`] is the seam every stage talks to; [`AmqpBroker`] implements it
//!   over RabbitMQ and `testing::MemoryBroker` in memory.
//! - [`BrokerConnection`] owns the connect/retry lifecycle and hands out the
//!   broker once the required queues exist.

mod amqp;
mod connection;
mod types;

pub use amqp::{AmqpBroker, AmqpConnector};
pub use connection::{BrokerConnection, ConnectionState, Connector, RetryPolicy};
pub use types::{
    Acknowledge, Broker, BrokerError, Delivery, DeliveryHandler, DeliveryStream, ANALYTICS_QUEUE,
    ORDER_QUEUE, REQUIRED_QUEUES,
};
