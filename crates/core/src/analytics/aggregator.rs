//! Running statistics over completion events.

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::info;

use super::types::{
    format_dollars, format_uptime, EventBreakdown, EventReport, RecentOrder, StatsReport,
    StatsSummary,
};
use crate::order::{ticket_price_for, CompletionEvent, EventType};

/// Recent orders shown by the stats query.
pub const STATS_RECENT_LIMIT: usize = 20;

/// Recent orders shown by the per-event query.
pub const EVENT_RECENT_LIMIT: usize = 10;

/// Default size of the recent-orders window.
pub const DEFAULT_RECENT_CAPACITY: usize = 100;

struct Aggregates {
    counts: HashMap<EventType, u64>,
    total_tickets: u64,
    total_revenue: u64,
    recent: VecDeque<RecentOrder>,
}

impl Aggregates {
    fn count(&self, event_type: EventType) -> u64 {
        self.counts.get(&event_type).copied().unwrap_or(0)
    }

    fn summary(&self, uptime: Duration) -> StatsSummary {
        let total: u64 = self.counts.values().sum();
        let secs = uptime.as_secs();
        let orders_per_minute = if total == 0 || secs == 0 {
            0.0
        } else {
            ((total as f64 / secs as f64) * 60.0 * 100.0).round() / 100.0
        };

        StatsSummary {
            total_orders: total,
            total_tickets: self.total_tickets,
            total_revenue: format_dollars(self.total_revenue),
            orders_per_minute,
            uptime: format_uptime(uptime),
        }
    }

    fn breakdown(&self) -> Vec<EventBreakdown> {
        let total: u64 = self.counts.values().sum();

        let mut events: Vec<EventBreakdown> = EventType::ALL
            .iter()
            .map(|t| {
                let count = self.count(*t);
                let percentage = if total == 0 {
                    0
                } else {
                    ((count as f64 / total as f64) * 100.0).round() as u64
                };
                EventBreakdown {
                    event: t.as_str().to_string(),
                    count,
                    percentage,
                    revenue: format_dollars(count * t.ticket_price()),
                }
            })
            .collect();
        events.sort_by(|a, b| b.count.cmp(&a.count));
        events
    }

    fn recent(&self, limit: usize) -> Vec<RecentOrder> {
        self.recent.iter().rev().take(limit).cloned().collect()
    }

    fn recent_for(&self, event_type: EventType, limit: usize) -> Vec<RecentOrder> {
        self.recent
            .iter()
            .rev()
            .filter(|o| o.event == event_type.as_str())
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Counters, revenue and a bounded window of recent completions.
///
/// Totals only grow; nothing resets them short of a restart.
pub struct AnalyticsAggregator {
    inner: RwLock<Aggregates>,
    capacity: usize,
    started_at: Instant,
}

impl AnalyticsAggregator {
    pub fn new(recent_capacity: usize) -> Self {
        let capacity = recent_capacity.max(1);
        Self {
            inner: RwLock::new(Aggregates {
                counts: EventType::ALL.iter().map(|t| (*t, 0)).collect(),
                total_tickets: 0,
                total_revenue: 0,
                recent: VecDeque::with_capacity(capacity),
            }),
            capacity,
            started_at: Instant::now(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Aggregates> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Aggregates> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold one completion into the aggregates.
    ///
    /// Unknown event types count towards total tickets and the recent window
    /// but earn no revenue and have no per-event counter.
    pub fn record(&self, event: &CompletionEvent) {
        let quantity = u64::from(event.quantity);
        let mut agg = self.write();

        if let Ok(event_type) = event.event_type.parse::<EventType>() {
            *agg.counts.entry(event_type).or_insert(0) += quantity;
        }
        agg.total_tickets += quantity;
        agg.total_revenue += quantity * ticket_price_for(&event.event_type);

        agg.recent.push_back(RecentOrder {
            id: event.order_id,
            event: event.event_type.clone(),
            customer: event.customer.clone(),
            quantity: event.quantity,
            timestamp: event.fulfilled_at.unwrap_or_else(Utc::now),
        });
        while agg.recent.len() > self.capacity {
            agg.recent.pop_front();
        }
    }

    pub fn count(&self, event_type: EventType) -> u64 {
        self.read().count(event_type)
    }

    pub fn total_tickets(&self) -> u64 {
        self.read().total_tickets
    }

    /// Revenue in whole dollars.
    pub fn total_revenue(&self) -> u64 {
        self.read().total_revenue
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Sum of the per-event counters.
    pub fn total_orders(&self) -> u64 {
        self.read().counts.values().sum()
    }

    pub fn summary(&self) -> StatsSummary {
        self.read().summary(self.uptime())
    }

    #[cfg(test)]
    fn summary_at(&self, uptime: Duration) -> StatsSummary {
        self.read().summary(uptime)
    }

    /// Per-event counts, most popular first.
    pub fn breakdown(&self) -> Vec<EventBreakdown> {
        self.read().breakdown()
    }

    /// Up to `limit` recent orders, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RecentOrder> {
        self.read().recent(limit)
    }

    /// Up to `limit` recent orders of one event type, newest first.
    pub fn recent_for(&self, event_type: EventType, limit: usize) -> Vec<RecentOrder> {
        self.read().recent_for(event_type, limit)
    }

    pub fn recent_len(&self) -> usize {
        self.read().recent.len()
    }

    /// Summary, breakdown and recent orders taken from one snapshot.
    pub fn stats_report(&self) -> StatsReport {
        let uptime = self.uptime();
        let agg = self.read();
        StatsReport {
            summary: agg.summary(uptime),
            events: agg.breakdown(),
            recent_orders: agg.recent(STATS_RECENT_LIMIT),
        }
    }

    /// Totals for one event type, matched case-insensitively.
    pub fn event_report(&self, name: &str) -> Option<EventReport> {
        let event_type: EventType = name.to_lowercase().parse().ok()?;
        let agg = self.read();
        let total_tickets = agg.count(event_type);

        Some(EventReport {
            event: event_type.as_str().to_string(),
            total_tickets,
            total_revenue: format_dollars(total_tickets * event_type.ticket_price()),
            recent_orders: agg.recent_for(event_type, EVENT_RECENT_LIMIT),
        })
    }

    /// Log the per-event share and the running totals.
    pub fn log_report(&self) {
        let agg = self.read();
        info!("Event ticket analytics:");
        for entry in agg.breakdown() {
            info!(
                "  {:<10}: {}% ({} tickets)",
                entry.event, entry.percentage, entry.count
            );
        }
        info!(
            "  Total revenue: {}, total tickets: {}",
            format_dollars(agg.total_revenue),
            agg.total_tickets
        );
    }
}

impl Default for AnalyticsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}
