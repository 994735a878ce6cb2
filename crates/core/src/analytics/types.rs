//! Analytics query results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A completed order as kept in the recent-orders window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentOrder {
    pub id: u64,
    pub event: String,
    pub customer: String,
    pub quantity: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    /// Tickets counted across the known event types.
    pub total_orders: u64,
    pub total_tickets: u64,
    /// Formatted as `$1,234`.
    pub total_revenue: String,
    pub orders_per_minute: f64,
    /// Formatted as `Xm Ys`.
    pub uptime: String,
}

/// One event type's share of the known-type total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventBreakdown {
    pub event: String,
    pub count: u64,
    pub percentage: u64,
    pub revenue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub summary: StatsSummary,
    pub events: Vec<EventBreakdown>,
    pub recent_orders: Vec<RecentOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReport {
    pub event: String,
    pub total_tickets: u64,
    pub total_revenue: String,
    pub recent_orders: Vec<RecentOrder>,
}

/// Whole dollars with thousands separators: `1234567` -> `$1,234,567`.
pub fn format_dollars(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Minutes and seconds: `125s` -> `2m 5s`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_dollars() {
        assert_eq!(format_dollars(0), "$0");
        assert_eq!(format_dollars(30), "$30");
        assert_eq!(format_dollars(999), "$999");
        assert_eq!(format_dollars(1000), "$1,000");
        assert_eq!(format_dollars(1234567), "$1,234,567");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::ZERO), "0m 0s");
        assert_eq!(format_uptime(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_uptime(Duration::from_millis(59_999)), "0m 59s");
    }

    #[test]
    fn test_recent_order_serializes_event_key() {
        let order = RecentOrder {
            id: 1,
            event: "movie".to_string(),
            customer: "Ann".to_string(),
            quantity: 2,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["event"], "movie");
        assert_eq!(json["quantity"], 2);
        assert!(json.get("timestamp").is_some());
    }
}
