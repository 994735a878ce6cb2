//! Order domain types and wire messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Ticket categories accepted by the intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Movie,
    Game,
    Concert,
    Sports,
}

impl EventType {
    /// Every valid event type, in display order.
    pub const ALL: [EventType; 4] = [
        EventType::Movie,
        EventType::Game,
        EventType::Concert,
        EventType::Sports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Movie => "movie",
            EventType::Game => "game",
            EventType::Concert => "concert",
            EventType::Sports => "sports",
        }
    }

    /// Fixed ticket price in whole dollars.
    pub fn ticket_price(&self) -> u64 {
        match self {
            EventType::Movie => 15,
            EventType::Game => 50,
            EventType::Concert => 75,
            EventType::Sports => 60,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EventType::Movie => "Movie tickets",
            EventType::Game => "Gaming event tickets",
            EventType::Concert => "Concert tickets",
            EventType::Sports => "Sports event tickets",
        }
    }

    /// Names of all valid event types.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(EventType::as_str).collect()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

impl FromStr for EventType {
    type Err = UnknownEventType;

    /// Exact, case-sensitive match against the valid names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Price for an event type name as it travels on the wire. Unknown types earn nothing.
pub fn ticket_price_for(event_type: &str) -> u64 {
    event_type
        .parse::<EventType>()
        .map(|t| t.ticket_price())
        .unwrap_or(0)
}

/// Order lifecycle status.
///
/// Orders are created `Pending` and nothing transitions them further yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Fulfilled,
}

/// A ticket order held by the intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub event_type: EventType,
    pub customer: String,
    pub quantity: u32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Order as published to the order queue.
///
/// The event type is kept as a plain string so a consumer can still handle
/// producers that send types it does not know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessage {
    pub id: u64,
    #[serde(alias = "event")]
    pub event_type: String,
    pub customer: String,
    pub quantity: u32,
    #[serde(default = "pending")]
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn pending() -> OrderStatus {
    OrderStatus::Pending
}

impl From<&Order> for OrderMessage {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            event_type: order.event_type.as_str().to_string(),
            customer: order.customer.clone(),
            quantity: order.quantity,
            status: order.status,
            created_at: Some(order.created_at),
        }
    }
}

/// Completion event as published to the analytics queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    #[serde(rename = "id")]
    pub order_id: u64,
    #[serde(alias = "event")]
    pub event_type: String,
    pub customer: String,
    pub quantity: u32,
    #[serde(default)]
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl CompletionEvent {
    /// Completion for a processed order message, stamped now.
    pub fn for_order(order: &OrderMessage) -> Self {
        Self {
            order_id: order.id,
            event_type: order.event_type.clone(),
            customer: order.customer.clone(),
            quantity: order.quantity,
            fulfilled_at: Some(Utc::now()),
        }
    }
}

/// Simulated fulfillment latency for a known event type, before config overrides.
pub fn default_processing_time(event_type: EventType) -> Duration {
    Duration::from_millis(match event_type {
        EventType::Movie => 2000,
        EventType::Game => 3000,
        EventType::Concert => 4000,
        EventType::Sports => 3500,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parse() {
        assert_eq!("movie".parse::<EventType>().unwrap(), EventType::Movie);
        assert_eq!("sports".parse::<EventType>().unwrap(), EventType::Sports);
        assert_eq!(
            "opera".parse::<EventType>().unwrap_err(),
            UnknownEventType("opera".to_string())
        );
        // Matching is exact, like the original validation list
        assert!("Movie".parse::<EventType>().is_err());
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::names(), vec!["movie", "game", "concert", "sports"]);
    }

    #[test]
    fn test_ticket_prices() {
        assert_eq!(ticket_price_for("movie"), 15);
        assert_eq!(ticket_price_for("game"), 50);
        assert_eq!(ticket_price_for("concert"), 75);
        assert_eq!(ticket_price_for("sports"), 60);
        assert_eq!(ticket_price_for("opera"), 0);
    }

    #[test]
    fn test_default_processing_times() {
        assert_eq!(default_processing_time(EventType::Movie).as_millis(), 2000);
        assert_eq!(default_processing_time(EventType::Game).as_millis(), 3000);
        assert_eq!(default_processing_time(EventType::Concert).as_millis(), 4000);
        assert_eq!(default_processing_time(EventType::Sports).as_millis(), 3500);
    }

    #[test]
    fn test_order_message_wire_format() {
        let order = Order {
            id: 7,
            event_type: EventType::Concert,
            customer: "Ann".to_string(),
            quantity: 2,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(OrderMessage::from(&order)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["eventType"], "concert");
        assert_eq!(json["customer"], "Ann");
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["status"], "pending");
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn test_order_message_accepts_legacy_event_key() {
        let msg: OrderMessage =
            serde_json::from_str(r#"{"id":3,"event":"game","customer":"Bob","quantity":1}"#)
                .unwrap();
        assert_eq!(msg.event_type, "game");
        assert_eq!(msg.status, OrderStatus::Pending);
        assert!(msg.created_at.is_none());
    }

    #[test]
    fn test_completion_event_preserves_order_fields() {
        let msg = OrderMessage {
            id: 42,
            event_type: "sports".to_string(),
            customer: "Cleo".to_string(),
            quantity: 4,
            status: OrderStatus::Pending,
            created_at: None,
        };
        let completion = CompletionEvent::for_order(&msg);
        assert_eq!(completion.order_id, 42);
        assert_eq!(completion.event_type, "sports");
        assert_eq!(completion.customer, "Cleo");
        assert_eq!(completion.quantity, 4);
        assert!(completion.fulfilled_at.is_some());

        let json = serde_json::to_value(&completion).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["eventType"], "sports");
        assert!(json["fulfilledAt"].is_string());
    }
}
