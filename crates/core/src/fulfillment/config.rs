//! Fulfillment worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::order::{default_processing_time, EventType};

/// Simulated processing latency per event type, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentConfig {
    /// Consume the order queue in this process.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_movie")]
    pub movie_ms: u64,

    #[serde(default = "default_game")]
    pub game_ms: u64,

    #[serde(default = "default_concert")]
    pub concert_ms: u64,

    #[serde(default = "default_sports")]
    pub sports_ms: u64,

    /// Latency for event types this worker does not know.
    #[serde(default = "default_movie")]
    pub default_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn millis(event_type: EventType) -> u64 {
    default_processing_time(event_type).as_millis() as u64
}

fn default_movie() -> u64 {
    millis(EventType::Movie)
}

fn default_game() -> u64 {
    millis(EventType::Game)
}

fn default_concert() -> u64 {
    millis(EventType::Concert)
}

fn default_sports() -> u64 {
    millis(EventType::Sports)
}

impl FulfillmentConfig {
    /// Same latency for every event type.
    pub fn uniform(latency: Duration) -> Self {
        let ms = latency.as_millis() as u64;
        Self {
            enabled: true,
            movie_ms: ms,
            game_ms: ms,
            concert_ms: ms,
            sports_ms: ms,
            default_ms: ms,
        }
    }

    /// Latency for an event type name as received on the wire.
    pub fn processing_time(&self, event_type: &str) -> Duration {
        let ms = match event_type.parse::<EventType>() {
            Ok(EventType::Movie) => self.movie_ms,
            Ok(EventType::Game) => self.game_ms,
            Ok(EventType::Concert) => self.concert_ms,
            Ok(EventType::Sports) => self.sports_ms,
            Err(_) => self.default_ms,
        };
        Duration::from_millis(ms)
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            movie_ms: default_movie(),
            game_ms: default_game(),
            concert_ms: default_concert(),
            sports_ms: default_sports(),
            default_ms: default_movie(),
        }
    }
}
