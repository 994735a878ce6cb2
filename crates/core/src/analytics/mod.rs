//! Analytics stage: aggregates completion events into running statistics.

mod aggregator;
mod consumer;
mod types;

pub use aggregator::{
    AnalyticsAggregator, DEFAULT_RECENT_CAPACITY, EVENT_RECENT_LIMIT, STATS_RECENT_LIMIT,
};
pub use consumer::{spawn_report_loop, AnalyticsConsumer};
pub use types::{
    format_dollars, format_uptime, EventBreakdown, EventReport, RecentOrder, StatsReport,
    StatsSummary,
};
