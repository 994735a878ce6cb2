//! In-memory order table.

use std::sync::{PoisonError, RwLock};

use chrono::Utc;

use super::types::{EventType, Order, OrderStatus};

/// Process-local order table.
///
/// Ids start at 1 and are never reused. Nothing is persisted and the table
/// grows without bound for the lifetime of the process.
#[derive(Debug)]
pub struct OrderStore {
    inner: RwLock<Table>,
}

#[derive(Debug)]
struct Table {
    next_id: u64,
    orders: Vec<Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Table {
                next_id: 1,
                orders: Vec::new(),
            }),
        }
    }

    /// Assign the next id and append a pending order, as one step.
    pub fn create(&self, event_type: EventType, customer: &str, quantity: u32) -> Order {
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let order = Order {
            id: table.next_id,
            event_type,
            customer: customer.to_string(),
            quantity,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        table.next_id += 1;
        table.orders.push(order.clone());
        order
    }

    pub fn get(&self, id: u64) -> Option<Order> {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        // Ids are assigned in insertion order
        table
            .orders
            .binary_search_by_key(&id, |o| o.id)
            .ok()
            .map(|idx| table.orders[idx].clone())
    }

    /// All orders, oldest first.
    pub fn list(&self) -> Vec<Order> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .orders
            .clone()
    }

    /// The newest `limit` orders, newest first.
    pub fn latest(&self, limit: usize) -> Vec<Order> {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        table.orders.iter().rev().take(limit).cloned().collect()
    }

    /// Orders for a customer, compared case-insensitively.
    pub fn list_by_customer(&self, customer: &str) -> Vec<Order> {
        let wanted = customer.to_lowercase();
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        table
            .orders
            .iter()
            .filter(|o| o.customer.to_lowercase() == wanted)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .orders
            .len()
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}
