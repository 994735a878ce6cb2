//! Consumer supervisor implementation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, Mutex, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::types::{ConsumerState, ConsumerStatus, EnsureOutcome, SupervisorError};
use crate::broker::{BrokerConnection, DeliveryHandler, DeliveryStream};
use crate::metrics;

/// Keeps one subscription to a queue alive and feeds it to a handler.
///
/// Each delivery is handled in its own task, so a slow handler never holds
/// up the stream; the broker prefetch limit bounds how many run at once.
pub struct ConsumerSupervisor {
    shared: Arc<Shared>,
    keep_alive: Duration,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    shutdown_tx: broadcast::Sender<()>,
}

struct Shared {
    queue: String,
    handler: Arc<dyn DeliveryHandler>,
    connection: Arc<BrokerConnection>,
    // Held across subscribe so concurrent callers create one subscription
    state: Arc<Mutex<ConsumerState>>,
    starts: AtomicU64,
}

impl ConsumerSupervisor {
    pub fn new(
        queue: impl Into<String>,
        handler: Arc<dyn DeliveryHandler>,
        connection: Arc<BrokerConnection>,
        keep_alive: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shared: Arc::new(Shared {
                queue: queue.into(),
                handler,
                connection,
                state: Arc::new(Mutex::new(ConsumerState::default())),
                starts: AtomicU64::new(0),
            }),
            keep_alive,
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            shutdown_tx,
        }
    }

    pub fn name(&self) -> &str {
        self.shared.handler.name()
    }

    pub fn queue(&self) -> &str {
        &self.shared.queue
    }

    /// Subscribe unless a subscription is already active.
    pub async fn ensure_running(&self) -> Result<EnsureOutcome, SupervisorError> {
        self.shared.ensure_running().await
    }

    /// Wake the keep-alive loop for an immediate check.
    pub fn request_check(&self) {
        self.wake.notify_one();
    }

    pub async fn state(&self) -> ConsumerState {
        self.shared.state.lock().await.clone()
    }

    pub async fn status(&self) -> ConsumerStatus {
        let state = self.state().await;
        ConsumerStatus {
            name: self.name().to_string(),
            queue: self.shared.queue.clone(),
            running: state.running,
            consumer_tag: state.tag,
            starts: self.shared.starts.load(Ordering::SeqCst),
        }
    }

    /// Start the keep-alive loop. It checks once immediately.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Supervisor for {} already running", self.shared.queue);
            return;
        }

        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let wake = Arc::clone(&self.wake);
        let interval = self.keep_alive;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(
                "Keep-alive loop for {} started (every {:?})",
                shared.queue, interval
            );
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                match shared.ensure_running().await {
                    Ok(_) => {}
                    Err(SupervisorError::NotConnected) => {
                        debug!("Broker not connected, {} consumer waits", shared.queue);
                    }
                    Err(e) => warn!("Keep-alive check for {} failed: {}", shared.queue, e),
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Keep-alive loop for {} received shutdown signal", shared.queue);
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                    _ = wake.notified() => {}
                }
            }
            info!("Keep-alive loop for {} stopped", shared.queue);
        });
    }

    /// Stop the keep-alive loop and cancel the active subscription.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Supervisor for {} not running", self.shared.queue);
        }
        let _ = self.shutdown_tx.send(());

        let mut state = self.shared.state.lock().await;
        if let Some(tag) = state.tag.take() {
            if let Some(broker) = self.shared.connection.broker() {
                if let Err(e) = broker.cancel(&tag).await {
                    warn!("Failed to cancel consumer {}: {}", tag, e);
                }
            }
            info!("Consumer {} cancelled", tag);
        }
        state.running = false;
    }
}

impl Shared {
    async fn ensure_running(&self) -> Result<EnsureOutcome, SupervisorError> {
        let mut state = self.state.lock().await;
        if state.running {
            if let Some(tag) = &state.tag {
                return Ok(EnsureOutcome::AlreadyRunning { tag: tag.clone() });
            }
        }

        let broker = self
            .connection
            .broker()
            .ok_or(SupervisorError::NotConnected)?;

        let name = self.handler.name();
        let tag = format!("{}-{}", name, Uuid::new_v4());
        let stream = broker.subscribe(&self.queue, &tag).await?;

        state.running = true;
        state.tag = Some(tag.clone());
        self.starts.fetch_add(1, Ordering::SeqCst);
        metrics::CONSUMER_STARTS.with_label_values(&[name]).inc();
        info!("Consumer {} started on {}", tag, self.queue);

        tokio::spawn(consume(
            stream,
            Arc::clone(&self.handler),
            Arc::clone(&self.state),
            tag.clone(),
            self.queue.clone(),
        ));

        Ok(EnsureOutcome::Started { tag })
    }
}

/// Drain a subscription, one task per delivery. Clears the supervisor state
/// when the stream ends so the next check subscribes again.
async fn consume(
    mut stream: DeliveryStream,
    handler: Arc<dyn DeliveryHandler>,
    state: Arc<Mutex<ConsumerState>>,
    tag: String,
    queue: String,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(delivery) => {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler.handle(delivery).await;
                });
            }
            Err(e) => {
                error!("Consumer {} on {} failed: {}", tag, queue, e);
                break;
            }
        }
    }

    let mut state = state.lock().await;
    if state.tag.as_deref() == Some(tag.as_str()) {
        *state = ConsumerState::default();
        warn!("Consumer {} on {} ended, awaiting restart", tag, queue);
    }
}
