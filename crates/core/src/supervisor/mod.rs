//! Consumer supervision.
//!
//! A [`ConsumerSupervisor`] owns one queue subscription and restarts it when
//! it goes away:
//! - `ensure_running` is a no-op while subscribed, otherwise subscribes again
//! - the subscription task clears the state when its delivery stream ends
//! - a keep-alive loop calls `ensure_running` periodically and on request

mod runner;
mod types;

pub use runner::ConsumerSupervisor;
pub use types::{ConsumerState, ConsumerStatus, EnsureOutcome, SupervisorError};
