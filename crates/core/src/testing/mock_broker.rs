//! In-memory broker for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;

use crate::broker::{
    Acknowledge, Broker, BrokerError, Connector, Delivery, DeliveryStream,
};

/// A message waiting in, or checked out of, a queue.
#[derive(Debug, Clone)]
struct Message {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    declared: u32,
    ready: VecDeque<Message>,
    unacked: HashMap<u64, Message>,
    consumers: Vec<Subscriber>,
    next_consumer: usize,
    published: Vec<Vec<u8>>,
}

struct Subscriber {
    tag: String,
    tx: mpsc::UnboundedSender<Result<Delivery, BrokerError>>,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<String, QueueState>,
    tags: HashMap<String, String>,
    next_delivery_tag: u64,
    disconnected: bool,
    fail_publish: HashMap<String, u32>,
    fail_subscribe: u32,
    subscribe_calls: u32,
}

/// Mock implementation of the Broker trait.
///
/// Models what the pipeline relies on from RabbitMQ:
/// - FIFO queues, round-robin across consumers
/// - Messages stay unacked until `ack`; `nack(requeue)` puts them back at the
///   head with the redelivered flag set
/// - Cancelling a consumer ends its stream
/// - `disconnect()` drops every consumer and requeues unacked messages
///
/// Failures can be injected for publish and subscribe.
///
/// # Example
///
/// ```rust,ignore
/// let broker = MemoryBroker::new();
/// broker.declare_queue("ticket-order").await?;
/// broker.publish("ticket-order", b"{}").await?;
/// assert_eq!(broker.ready_count("ticket-order"), 1);
/// ```
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("queues", &"<queues>")
            .finish()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn queue_exists(&self, queue: &str) -> bool {
        self.lock().queues.contains_key(queue)
    }

    /// How many times the queue was declared.
    pub fn declare_count(&self, queue: &str) -> u32 {
        self.lock().queues.get(queue).map_or(0, |q| q.declared)
    }

    /// Messages waiting for a consumer.
    pub fn ready_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Messages delivered but not yet acked or nacked.
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.unacked.len())
    }

    pub fn consumer_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.consumers.len())
    }

    /// Every payload ever accepted on the queue, in publish order.
    pub fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.published.clone())
            .unwrap_or_default()
    }

    /// Published payloads decoded as JSON.
    pub fn published_json(&self, queue: &str) -> Vec<serde_json::Value> {
        self.published(queue)
            .iter()
            .filter_map(|p| serde_json::from_slice(p).ok())
            .collect()
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.lock().subscribe_calls
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Make the next `count` publishes to `queue` fail.
    pub fn fail_next_publishes(&self, queue: &str, count: u32) {
        self.lock().fail_publish.insert(queue.to_string(), count);
    }

    /// Make the next `count` subscribe calls fail.
    pub fn fail_next_subscribes(&self, count: u32) {
        self.lock().fail_subscribe = count;
    }

    /// Put a raw payload on a queue, bypassing failure injection.
    pub fn inject(&self, queue: &str, payload: &[u8]) {
        let mut inner = self.lock();
        let state = inner.queues.entry(queue.to_string()).or_default();
        state.ready.push_back(Message {
            payload: payload.to_vec(),
            redelivered: false,
        });
        self.dispatch(&mut inner, queue);
    }

    /// Simulate losing the connection: all streams end, unacked messages go
    /// back to their queues and further operations fail until `reconnect`.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        inner.disconnected = true;
        inner.tags.clear();
        for state in inner.queues.values_mut() {
            state.consumers.clear();
            let mut returned: Vec<(u64, Message)> = state.unacked.drain().collect();
            returned.sort_by_key(|(tag, _)| std::cmp::Reverse(*tag));
            for (_, mut message) in returned {
                message.redelivered = true;
                state.ready.push_front(message);
            }
        }
    }

    pub fn reconnect(&self) {
        self.lock().disconnected = false;
    }

    /// Hand ready messages to consumers until either runs out.
    fn dispatch(&self, inner: &mut Inner, queue: &str) {
        loop {
            let Some(state) = inner.queues.get_mut(queue) else {
                return;
            };
            if state.consumers.is_empty() {
                return;
            }
            let Some(message) = state.ready.pop_front() else {
                return;
            };

            let idx = state.next_consumer % state.consumers.len();
            inner.next_delivery_tag += 1;
            let delivery_tag = inner.next_delivery_tag;
            let acker = MemoryAcker {
                broker: self.clone(),
                queue: queue.to_string(),
                delivery_tag,
            };
            let delivery = Delivery::new(
                message.payload.clone(),
                message.redelivered,
                Box::new(acker),
            );

            let Some(state) = inner.queues.get_mut(queue) else {
                return;
            };
            if state.consumers[idx].tx.unbounded_send(Ok(delivery)).is_ok() {
                state.unacked.insert(delivery_tag, message);
                state.next_consumer = idx + 1;
            } else {
                // Receiver went away without cancelling
                let tag = state.consumers.remove(idx).tag;
                state.ready.push_front(message);
                inner.tags.remove(&tag);
            }
        }
    }

    fn settle(&self, queue: &str, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        let state = inner
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::Acknowledge(format!("unknown queue {queue}")))?;
        let Some(mut message) = state.unacked.remove(&delivery_tag) else {
            return Err(BrokerError::Acknowledge(format!(
                "unknown delivery tag {delivery_tag}"
            )));
        };
        if requeue {
            message.redelivered = true;
            state.ready.push_front(message);
            self.dispatch(&mut inner, queue);
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        if inner.disconnected {
            return Err(BrokerError::Declare {
                queue: queue.to_string(),
                reason: "connection closed".to_string(),
            });
        }
        inner.queues.entry(queue.to_string()).or_default().declared += 1;
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        let publish_err = |reason: &str| BrokerError::Publish {
            queue: queue.to_string(),
            reason: reason.to_string(),
        };

        if inner.disconnected {
            return Err(publish_err("connection closed"));
        }
        if let Some(remaining) = inner.fail_publish.get_mut(queue) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(publish_err("injected failure"));
            }
        }
        let Some(state) = inner.queues.get_mut(queue) else {
            return Err(publish_err("queue not declared"));
        };

        state.published.push(payload.to_vec());
        state.ready.push_back(Message {
            payload: payload.to_vec(),
            redelivered: false,
        });
        self.dispatch(&mut inner, queue);
        Ok(())
    }

    async fn subscribe(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, BrokerError> {
        let mut inner = self.lock();
        inner.subscribe_calls += 1;

        let subscribe_err = |reason: &str| BrokerError::Subscribe {
            queue: queue.to_string(),
            reason: reason.to_string(),
        };

        if inner.disconnected {
            return Err(subscribe_err("connection closed"));
        }
        if inner.fail_subscribe > 0 {
            inner.fail_subscribe -= 1;
            return Err(subscribe_err("injected failure"));
        }
        if inner.tags.contains_key(consumer_tag) {
            return Err(subscribe_err("consumer tag already in use"));
        }
        let Some(state) = inner.queues.get_mut(queue) else {
            return Err(subscribe_err("queue not declared"));
        };

        let (tx, rx) = mpsc::unbounded();
        state.consumers.push(Subscriber {
            tag: consumer_tag.to_string(),
            tx,
        });
        inner
            .tags
            .insert(consumer_tag.to_string(), queue.to_string());
        self.dispatch(&mut inner, queue);

        Ok(rx.boxed())
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        let Some(queue) = inner.tags.remove(consumer_tag) else {
            return Ok(());
        };
        if let Some(state) = inner.queues.get_mut(&queue) {
            // Dropping the sender ends the stream
            state.consumers.retain(|c| c.tag != consumer_tag);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.lock().disconnected
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    queue: String,
    delivery_tag: u64,
}

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.broker.settle(&self.queue, self.delivery_tag, false)
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.broker.settle(&self.queue, self.delivery_tag, requeue)
    }
}

/// Connector handing out a shared [`MemoryBroker`], optionally failing the
/// first few attempts.
pub struct MemoryConnector {
    broker: MemoryBroker,
    fail_first: u32,
    attempts: AtomicU32,
}

impl MemoryConnector {
    pub fn new(broker: MemoryBroker) -> Self {
        Self {
            broker,
            fail_first: 0,
            attempts: AtomicU32::new(0),
        }
    }

    /// Fail the first `count` connection attempts.
    pub fn failing_first(mut self, count: u32) -> Self {
        self.fail_first = count;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn Broker>, BrokerError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            return Err(BrokerError::Connection(format!(
                "connection refused (attempt {attempt})"
            )));
        }
        Ok(Arc::new(self.broker.clone()))
    }
}
