use std::sync::Arc;

use ticketflow_core::{
    AnalyticsAggregator, AnalyticsConsumer, BrokerConnection, Config, ConsumerStatus,
    ConsumerSupervisor, FulfillmentWorker, OrderIntake, SanitizedConfig, ANALYTICS_QUEUE,
    ORDER_QUEUE,
};

/// Shared application state
pub struct AppState {
    config: Config,
    connection: Arc<BrokerConnection>,
    intake: OrderIntake,
    aggregator: Arc<AnalyticsAggregator>,
    fulfillment: Option<ConsumerSupervisor>,
    analytics: Option<ConsumerSupervisor>,
}

impl AppState {
    /// Wire the pipeline stages enabled in `config` to one broker connection.
    pub fn new(config: Config, connection: Arc<BrokerConnection>) -> Self {
        let keep_alive = config.supervisor.keep_alive_interval();
        let aggregator = Arc::new(AnalyticsAggregator::new(config.analytics.recent_capacity));

        let fulfillment = config.fulfillment.enabled.then(|| {
            ConsumerSupervisor::new(
                ORDER_QUEUE,
                Arc::new(FulfillmentWorker::new(
                    Arc::clone(&connection),
                    config.fulfillment.clone(),
                )),
                Arc::clone(&connection),
                keep_alive,
            )
        });

        let analytics = config.analytics.enabled.then(|| {
            ConsumerSupervisor::new(
                ANALYTICS_QUEUE,
                Arc::new(AnalyticsConsumer::new(Arc::clone(&aggregator))),
                Arc::clone(&connection),
                keep_alive,
            )
        });

        Self {
            intake: OrderIntake::new(Arc::clone(&connection)),
            config,
            connection,
            aggregator,
            fulfillment,
            analytics,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn connection(&self) -> &BrokerConnection {
        &self.connection
    }

    pub fn intake(&self) -> &OrderIntake {
        &self.intake
    }

    pub fn aggregator(&self) -> &AnalyticsAggregator {
        &self.aggregator
    }

    pub fn aggregator_handle(&self) -> Arc<AnalyticsAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Supervisors of the consumers running in this process.
    pub fn supervisors(&self) -> impl Iterator<Item = &ConsumerSupervisor> {
        self.fulfillment.iter().chain(self.analytics.iter())
    }

    pub async fn consumer_statuses(&self) -> Vec<ConsumerStatus> {
        let mut statuses = Vec::new();
        for supervisor in self.supervisors() {
            statuses.push(supervisor.status().await);
        }
        statuses
    }

    /// Ask every keep-alive loop for an immediate check.
    pub fn request_checks(&self) {
        for supervisor in self.supervisors() {
            supervisor.request_check();
        }
    }

    pub fn start_supervisors(&self) {
        for supervisor in self.supervisors() {
            supervisor.start();
        }
    }

    pub async fn stop_supervisors(&self) {
        for supervisor in self.supervisors() {
            supervisor.stop().await;
        }
    }
}
