//! Broker connection lifecycle with bounded fixed-delay retry.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::types::{Broker, BrokerError, REQUIRED_QUEUES};
use crate::metrics;

/// Opens a fresh broker session. One call is one connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Broker>, BrokerError>;
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retry without waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32, max_attempts: u32 },
    Connected,
    Failed { attempts: u32, reason: String },
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting { .. } => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed { .. } => "failed",
        }
    }
}

/// Owns the broker handle once connected.
///
/// Until `connect` succeeds `broker()` returns `None`, so no queue operation
/// can be issued against a half-initialized session.
pub struct BrokerConnection {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    broker: RwLock<Option<Arc<dyn Broker>>>,
    state_tx: watch::Sender<ConnectionState>,
    connect_lock: Mutex<()>,
}

impl BrokerConnection {
    pub fn new(connector: Arc<dyn Connector>, policy: RetryPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            policy,
            broker: RwLock::new(None),
            state_tx,
            connect_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The broker handle, if a connection has been established.
    pub fn broker(&self) -> Option<Arc<dyn Broker>> {
        self.broker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.broker().is_some_and(|b| b.is_connected())
    }

    /// Connect and provision the required queues, retrying per the policy.
    ///
    /// Concurrent callers share one attempt sequence. Returns the existing
    /// handle when already connected.
    pub async fn connect(&self) -> Result<Arc<dyn Broker>, BrokerError> {
        let _guard = self.connect_lock.lock().await;

        if let Some(broker) = self.broker() {
            return Ok(broker);
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.state_tx.send_replace(ConnectionState::Connecting {
                attempt,
                max_attempts,
            });
            info!(
                "Attempting to connect to broker (attempt {}/{})",
                attempt, max_attempts
            );

            match self.try_connect().await {
                Ok(broker) => {
                    metrics::BROKER_CONNECT_ATTEMPTS
                        .with_label_values(&["success"])
                        .inc();
                    *self.broker.write().unwrap_or_else(PoisonError::into_inner) =
                        Some(Arc::clone(&broker));
                    self.state_tx.send_replace(ConnectionState::Connected);
                    info!("Connected to broker, queues provisioned");
                    return Ok(broker);
                }
                Err(e) => {
                    metrics::BROKER_CONNECT_ATTEMPTS
                        .with_label_values(&["failure"])
                        .inc();
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        warn!(
                            "Broker connection failed: {}. Retrying in {:?}",
                            last_error, self.policy.delay
                        );
                        if !self.policy.delay.is_zero() {
                            tokio::time::sleep(self.policy.delay).await;
                        }
                    }
                }
            }
        }

        error!(
            "Giving up on broker after {} attempts: {}",
            max_attempts, last_error
        );
        self.state_tx.send_replace(ConnectionState::Failed {
            attempts: max_attempts,
            reason: last_error.clone(),
        });
        Err(BrokerError::Unavailable {
            attempts: max_attempts,
            last_error,
        })
    }

    /// Run `connect` in the background.
    pub fn spawn_connect(self: &Arc<Self>) -> JoinHandle<Result<Arc<dyn Broker>, BrokerError>> {
        let connection = Arc::clone(self);
        tokio::spawn(async move { connection.connect().await })
    }

    /// Wait until the connection is established or has definitively failed.
    pub async fn wait_connected(&self) -> Result<Arc<dyn Broker>, BrokerError> {
        let mut rx = self.state_tx.subscribe();
        loop {
            let outcome = match &*rx.borrow_and_update() {
                ConnectionState::Connected => self.broker().map(Ok),
                ConnectionState::Failed { attempts, reason } => {
                    Some(Err(BrokerError::Unavailable {
                        attempts: *attempts,
                        last_error: reason.clone(),
                    }))
                }
                _ => None,
            };
            if let Some(result) = outcome {
                return result;
            }
            rx.changed()
                .await
                .map_err(|_| BrokerError::NotConnected)?;
        }
    }

    async fn try_connect(&self) -> Result<Arc<dyn Broker>, BrokerError> {
        let broker = self.connector.connect().await?;
        for queue in REQUIRED_QUEUES {
            broker.declare_queue(queue).await?;
        }
        Ok(broker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{ANALYTICS_QUEUE, ORDER_QUEUE};
    use crate::testing::{MemoryBroker, MemoryConnector};

    #[tokio::test]
    async fn test_connect_first_attempt_declares_queues() {
        let broker = MemoryBroker::new();
        let connector = Arc::new(MemoryConnector::new(broker.clone()));
        let connection = BrokerConnection::new(connector.clone(), RetryPolicy::immediate(3));

        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(connection.broker().is_none());

        connection.connect().await.unwrap();

        assert_eq!(connection.state(), ConnectionState::Connected);
        assert!(connection.is_connected());
        assert_eq!(connector.attempts(), 1);
        assert!(broker.queue_exists(ORDER_QUEUE));
        assert!(broker.queue_exists(ANALYTICS_QUEUE));
    }

    #[tokio::test]
    async fn test_connect_retries_until_success() {
        let broker = MemoryBroker::new();
        let connector = Arc::new(MemoryConnector::new(broker.clone()).failing_first(3));
        let connection = BrokerConnection::new(connector.clone(), RetryPolicy::immediate(10));

        connection.connect().await.unwrap();

        assert_eq!(connector.attempts(), 4);
        assert_eq!(connection.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_max_attempts() {
        let connector = Arc::new(MemoryConnector::new(MemoryBroker::new()).failing_first(100));
        let connection = BrokerConnection::new(connector.clone(), RetryPolicy::immediate(10));

        let err = connection.connect().await.err().unwrap();

        assert!(matches!(err, BrokerError::Unavailable { attempts: 10, .. }));
        assert_eq!(connector.attempts(), 10);
        assert!(matches!(
            connection.state(),
            ConnectionState::Failed { attempts: 10, .. }
        ));
        assert!(connection.broker().is_none());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_once_connected() {
        let broker = MemoryBroker::new();
        let connector = Arc::new(MemoryConnector::new(broker.clone()));
        let connection = BrokerConnection::new(connector.clone(), RetryPolicy::immediate(3));

        connection.connect().await.unwrap();
        connection.connect().await.unwrap();

        assert_eq!(connector.attempts(), 1);
        assert_eq!(broker.declare_count(ORDER_QUEUE), 1);
    }

    #[tokio::test]
    async fn test_wait_connected_observes_background_connect() {
        let broker = MemoryBroker::new();
        let connector = Arc::new(MemoryConnector::new(broker).failing_first(2));
        let connection = Arc::new(BrokerConnection::new(
            connector,
            RetryPolicy {
                max_attempts: 5,
                delay: Duration::from_millis(5),
            },
        ));

        let handle = connection.spawn_connect();
        let waited = connection.wait_connected().await;

        assert!(waited.is_ok());
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_wait_connected_reports_failure() {
        let connector = Arc::new(MemoryConnector::new(MemoryBroker::new()).failing_first(100));
        let connection = Arc::new(BrokerConnection::new(connector, RetryPolicy::immediate(2)));

        let _handle = connection.spawn_connect();
        let err = connection.wait_connected().await.err().unwrap();

        assert!(matches!(err, BrokerError::Unavailable { attempts: 2, .. }));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(ConnectionState::Connecting {
            attempt: 2,
            max_attempts: 10,
        })
        .unwrap();
        assert_eq!(json["state"], "connecting");
        assert_eq!(json["attempt"], 2);
        assert_eq!(ConnectionState::Connected.label(), "connected");
    }
}
