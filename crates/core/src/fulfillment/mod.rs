//! Fulfillment stage: turns queued orders into completion events.

mod config;
mod worker;

pub use config::FulfillmentConfig;
pub use worker::{FulfillmentError, FulfillmentWorker};
