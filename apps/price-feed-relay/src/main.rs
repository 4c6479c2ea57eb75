//! Price Feed Relay Binary
//!
//! Starts the Kafka to WebSocket price relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin price-feed-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `KAFKA_BROKER_URL`: Kafka bootstrap servers
//! - `KAFKA_TOPIC`: Price topic
//! - `KAFKA_GROUP_ID`: Consumer group identifier
//!
//! ## Optional
//! - `SERVER_PORT`: WebSocket port, `3000` or `:3000` (default: 3000)
//! - `RELAY_WS_PATH`: Upgrade path (default: /ws/livepricesfeed)
//! - `RELAY_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `RELAY_WRITE_TIMEOUT_MS`: Per-subscriber write deadline (default: 5000)
//! - `RELAY_READ_ERROR_BACKOFF_MS`: Pause after a bus read error (default: 250)
//! - `RELAY_SHUTDOWN_TIMEOUT_SECS`: Consumer shutdown grace (default: 5)
//! - `KAFKA_AUTO_OFFSET_RESET`: earliest | latest (default: earliest)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: price-feed-relay)
//! - `RUST_LOG`: Log filter (default: `price_feed_relay=info`)

use std::sync::Arc;

use price_feed_relay::infrastructure::broadcast::RegistryBroadcaster;
use price_feed_relay::infrastructure::bus::{BusConsumer, BusStatus, KafkaSource};
use price_feed_relay::infrastructure::health::{HealthServer, HealthServerState};
use price_feed_relay::infrastructure::telemetry;
use price_feed_relay::infrastructure::websocket::WsServer;
use price_feed_relay::{RegistryConfig, RelayConfig, SubscriptionRegistry, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Price Feed Relay");

    // Initialize Prometheus metrics
    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed, metrics disabled");
    }

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let registry = SubscriptionRegistry::shared(RegistryConfig::from(config.registry));

    // Bus consumer, with the registry as its only event sink
    let bus_status = BusStatus::shared();
    let source = KafkaSource::connect(&config.bus)?;
    let mut consumer = BusConsumer::new(source, Arc::clone(&bus_status))
        .with_read_error_backoff(config.registry.read_error_backoff);
    consumer.set_handler(RegistryBroadcaster::shared(Arc::clone(&registry)));

    let consumer_token = shutdown_token.clone();
    let consumer_task = tokio::spawn(async move {
        if let Err(e) = consumer.run(consumer_token).await {
            tracing::error!(error = %e, "Bus consumer error");
        }
    });

    // Spawn health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&registry),
        Arc::clone(&bus_status),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Spawn websocket server
    let ws_server = WsServer::new(&config.server, Arc::clone(&registry), shutdown_token.clone());
    tokio::spawn(async move {
        if let Err(e) = ws_server.run().await {
            tracing::error!(error = %e, "WebSocket server error");
        }
    });

    tracing::info!("Price relay ready");

    await_shutdown(shutdown_token).await;

    tracing::info!(
        timeout_secs = config.shutdown_timeout.as_secs(),
        "Graceful shutdown started"
    );

    if tokio::time::timeout(config.shutdown_timeout, consumer_task)
        .await
        .is_err()
    {
        tracing::warn!("Bus consumer did not stop within the shutdown timeout");
    }

    registry.close_all().await;

    tracing::info!("Price relay stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        port = config.server.port,
        ws_path = %config.server.ws_path,
        health_port = config.server.health_port,
        topic = %config.bus.topic,
        group = %config.bus.group_id,
        "Configuration loaded"
    );
    tracing::debug!(
        brokers = %config.bus.broker_url,
        write_timeout_ms = config.registry.write_timeout.as_millis(),
        read_error_backoff_ms = config.registry.read_error_backoff.as_millis(),
        "Relay tuning"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
