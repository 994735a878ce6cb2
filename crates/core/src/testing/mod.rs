//! Testing utilities and an in-memory broker for pipeline tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketflow_core::testing::{MemoryBroker, MemoryConnector};
//!
//! let broker = MemoryBroker::new();
//! let connection = BrokerConnection::new(
//!     Arc::new(MemoryConnector::new(broker.clone())),
//!     RetryPolicy::immediate(1),
//! );
//! connection.connect().await?;
//! ```

mod mock_broker;

pub use mock_broker::{MemoryBroker, MemoryConnector};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{MemoryBroker, MemoryConnector};
    use crate::broker::{BrokerConnection, RetryPolicy};
    use crate::fulfillment::FulfillmentConfig;
    use crate::order::{CompletionEvent, OrderMessage, OrderStatus};

    /// A connection over `broker` that has not connected yet.
    pub fn connection(broker: &MemoryBroker) -> Arc<BrokerConnection> {
        Arc::new(BrokerConnection::new(
            Arc::new(MemoryConnector::new(broker.clone())),
            RetryPolicy::immediate(1),
        ))
    }

    /// A connection over `broker` with both queues declared.
    pub async fn connected(broker: &MemoryBroker) -> Arc<BrokerConnection> {
        let connection = connection(broker);
        if let Err(e) = connection.connect().await {
            panic!("memory broker connect failed: {e}");
        }
        connection
    }

    /// Fulfillment latencies of zero for every event type.
    pub fn instant_fulfillment() -> FulfillmentConfig {
        FulfillmentConfig::uniform(Duration::ZERO)
    }

    pub fn order_message(id: u64, event_type: &str, customer: &str, quantity: u32) -> OrderMessage {
        OrderMessage {
            id,
            event_type: event_type.to_string(),
            customer: customer.to_string(),
            quantity,
            status: OrderStatus::Pending,
            created_at: None,
        }
    }

    pub fn completion(order_id: u64, event_type: &str, customer: &str, quantity: u32) -> CompletionEvent {
        CompletionEvent {
            order_id,
            event_type: event_type.to_string(),
            customer: customer.to_string(),
            quantity,
            fulfilled_at: Some(chrono::Utc::now()),
        }
    }

    /// Poll `check` until it returns true or `timeout` elapses.
    pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if check() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
