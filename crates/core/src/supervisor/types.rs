//! Supervisor types.

use serde::Serialize;
use thiserror::Error;

use crate::broker::BrokerError;

/// Subscription state owned by a supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerState {
    pub running: bool,
    pub tag: Option<String>,
}

/// Result of a successful [`ensure_running`](super::ConsumerSupervisor::ensure_running).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// A subscription was already active; nothing was done.
    AlreadyRunning { tag: String },
    /// A new subscription was created.
    Started { tag: String },
}

impl EnsureOutcome {
    pub fn tag(&self) -> &str {
        match self {
            EnsureOutcome::AlreadyRunning { tag } | EnsureOutcome::Started { tag } => tag,
        }
    }

    pub fn started(&self) -> bool {
        matches!(self, EnsureOutcome::Started { .. })
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("broker is not connected")]
    NotConnected,

    #[error("failed to start consumer: {0}")]
    Subscribe(#[from] BrokerError),
}

/// Snapshot of a supervised consumer for health reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerStatus {
    pub name: String,
    pub queue: String,
    pub running: bool,
    pub consumer_tag: Option<String>,
    /// Subscriptions created since startup, including the first one.
    pub starts: u64,
}
