//! Order intake: validation, id assignment and publication to the order queue.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use super::store::OrderStore;
use super::types::{EventType, Order, OrderMessage};
use crate::broker::{BrokerConnection, ORDER_QUEUE};
use crate::metrics;

/// Rejections returned to the caller of [`OrderIntake::submit_order`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("invalid event type '{given}', valid types: {}", .valid.join(", "))]
    InvalidEventType {
        given: String,
        valid: Vec<&'static str>,
    },

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("customer name is required")]
    MissingCustomer,
}

/// Accepts orders, keeps them in memory and hands them to the order queue.
///
/// Publication is best effort: when the broker is not connected yet, or the
/// publish fails, the order is still stored and returned.
pub struct OrderIntake {
    store: OrderStore,
    connection: Arc<BrokerConnection>,
}

impl OrderIntake {
    pub fn new(connection: Arc<BrokerConnection>) -> Self {
        Self::with_store(OrderStore::new(), connection)
    }

    pub fn with_store(store: OrderStore, connection: Arc<BrokerConnection>) -> Self {
        Self { store, connection }
    }

    /// Validate and record an order, then publish it to the order queue.
    pub async fn submit_order(
        &self,
        event_type: &str,
        customer: &str,
        quantity: u32,
    ) -> Result<Order, IntakeError> {
        let event_type: EventType =
            event_type
                .parse()
                .map_err(|_| IntakeError::InvalidEventType {
                    given: event_type.to_string(),
                    valid: EventType::names(),
                })?;
        if quantity == 0 {
            return Err(IntakeError::InvalidQuantity);
        }
        let customer = customer.trim();
        if customer.is_empty() {
            return Err(IntakeError::MissingCustomer);
        }

        let order = self.store.create(event_type, customer, quantity);
        metrics::ORDERS_SUBMITTED
            .with_label_values(&[event_type.as_str()])
            .inc();
        info!(
            "Order #{} received: {}x {} for {}",
            order.id, order.quantity, order.event_type, order.customer
        );

        self.publish(&order).await;
        Ok(order)
    }

    async fn publish(&self, order: &Order) {
        let Some(broker) = self.connection.broker() else {
            metrics::ORDERS_PUBLISH_SKIPPED.inc();
            warn!(
                "Broker not connected, order #{} stored but not queued",
                order.id
            );
            return;
        };

        let body = match serde_json::to_vec(&OrderMessage::from(order)) {
            Ok(body) => body,
            Err(e) => {
                metrics::ORDERS_PUBLISH_FAILED.inc();
                error!("Failed to encode order #{}: {}", order.id, e);
                return;
            }
        };

        if let Err(e) = broker.publish(ORDER_QUEUE, &body).await {
            metrics::ORDERS_PUBLISH_FAILED.inc();
            error!("Failed to queue order #{}: {}", order.id, e);
        }
    }

    pub fn get_order(&self, id: u64) -> Option<Order> {
        self.store.get(id)
    }

    /// All orders, oldest first.
    pub fn list_orders(&self) -> Vec<Order> {
        self.store.list()
    }

    /// Up to `limit` orders, newest first.
    pub fn latest_orders(&self, limit: usize) -> Vec<Order> {
        self.store.latest(limit)
    }

    /// Orders placed by `customer`, compared case-insensitively.
    pub fn list_orders_by_customer(&self, customer: &str) -> Vec<Order> {
        self.store.list_by_customer(customer)
    }

    pub fn order_count(&self) -> usize {
        self.store.count()
    }
}
