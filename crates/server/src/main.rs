use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketflow_core::{
    load_config, load_config_from_env, spawn_report_loop, validate_config, AmqpConnector,
    BrokerConnection, Config,
};
use ticketflow_server::{api::create_router, state::AppState};

/// Config file used when `TICKETFLOW_CONFIG` is not set.
const DEFAULT_CONFIG_FILE: &str = "ticketflow.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = read_config()?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        "Stages: fulfillment {}, analytics {}",
        enabled(config.fulfillment.enabled),
        enabled(config.analytics.enabled)
    );

    let connection = Arc::new(BrokerConnection::new(
        Arc::new(AmqpConnector::new(
            config.broker.url.clone(),
            config.broker.prefetch,
        )),
        config.broker.retry_policy(),
    ));

    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&connection)));

    // Connect in the background so HTTP is available while the broker comes up
    let (failure_tx, failure_rx) = watch::channel(None::<String>);
    let connect_task = connection.spawn_connect();
    {
        let state = Arc::clone(&state);
        let exit_on_failure = config.broker.exit_on_failure;
        tokio::spawn(async move {
            let failure = match connect_task.await {
                Ok(Ok(_)) => {
                    state.request_checks();
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("broker connect task failed: {}", e),
            };
            if exit_on_failure {
                failure_tx.send_replace(Some(failure));
            } else {
                warn!(
                    "Broker unavailable ({}), continuing without it",
                    failure
                );
            }
        });
    }

    state.start_supervisors();
    info!("Consumer supervisors started");

    let (shutdown_tx, _) = broadcast::channel(1);
    if config.analytics.enabled && config.analytics.report_interval_secs > 0 {
        spawn_report_loop(
            state.aggregator_handle(),
            Duration::from_secs(config.analytics.report_interval_secs),
            shutdown_tx.subscribe(),
        );
    }

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    let shutdown = {
        let failure_rx = failure_rx.clone();
        async move {
            tokio::select! {
                _ = shutdown_signal() => {},
                _ = broker_failure(failure_rx) => {},
            }
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    state.stop_supervisors().await;
    info!("Consumer supervisors stopped");

    if let Some(reason) = failure_rx.borrow().clone() {
        bail!("Broker unavailable: {}", reason);
    }
    Ok(())
}

/// Load config from `TICKETFLOW_CONFIG`, the default file if present,
/// or the environment alone.
fn read_config() -> Result<Config> {
    let config_path = std::env::var("TICKETFLOW_CONFIG").map(PathBuf::from).ok();

    match config_path {
        Some(path) => load_file(&path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => load_file(Path::new(DEFAULT_CONFIG_FILE)),
        None => {
            info!("No config file, using defaults and environment");
            load_config_from_env().context("Failed to load config from environment")
        }
    }
}

fn load_file(path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Resolves once the broker connection has definitively failed.
async fn broker_failure(mut rx: watch::Receiver<Option<String>>) {
    loop {
        if rx.borrow_and_update().is_some() {
            return;
        }
        if rx.changed().await.is_err() {
            // Connected, or failure tolerated: never resolves
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
