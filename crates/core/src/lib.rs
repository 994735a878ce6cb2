pub mod analytics;
pub mod broker;
pub mod config;
pub mod fulfillment;
pub mod metrics;
pub mod order;
pub mod supervisor;
pub mod testing;

pub use analytics::{
    spawn_report_loop, AnalyticsAggregator, AnalyticsConsumer, EventBreakdown, EventReport,
    RecentOrder, StatsReport, StatsSummary,
};
pub use broker::{
    AmqpConnector, Broker, BrokerConnection, BrokerError, ConnectionState, Connector, Delivery,
    DeliveryHandler, RetryPolicy, ANALYTICS_QUEUE, ORDER_QUEUE,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use fulfillment::{FulfillmentConfig, FulfillmentError, FulfillmentWorker};
pub use order::{
    CompletionEvent, EventType, IntakeError, Order, OrderIntake, OrderMessage, OrderStatus,
    OrderStore,
};
pub use supervisor::{
    ConsumerState, ConsumerStatus, ConsumerSupervisor, EnsureOutcome, SupervisorError,
};
