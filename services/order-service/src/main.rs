use anyhow::{Context, Result};
use common::config::AppConfig;
use common::telemetry::{init_telemetry, shutdown_telemetry};
use messaging::OrderConsumer;
use order_store::{OrderRepository, PostgresOrderRepository};
use read_model::{OrderCache, OrderLookup};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod coordinator;
mod handlers;
mod ingestion;
mod routes;
mod shutdown;
mod state;

use coordinator::Coordinator;
use ingestion::IngestionLoop;
use shutdown::OsSignals;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    init_telemetry("order-service", &config.telemetry)?;

    info!("Starting Order Service...");
    info!("Configuration:");
    info!(
        "  Database: {}:{}/{}",
        config.database.host, config.database.port, config.database.database
    );
    info!("  Kafka Brokers: {}", config.kafka.brokers);
    info!("  Kafka Topic: {}", config.kafka.topic);
    info!("  Consumer Group: {}", config.kafka.group_id);
    info!("  Port: {}", config.port);

    let mut signals = OsSignals::register().context("Failed to register signal handlers")?;

    let started = shutdown::unless_stopped(connect_and_restore(&config), async {
        if let Some(signal) = signals.recv().await {
            info!("Received shutdown signal {} during startup, exiting...", signal);
        }
    })
    .await;

    let (pool, repository, cache) = match started {
        Some(started) => started?,
        None => {
            signals.close();
            shutdown_telemetry();
            return Ok(());
        }
    };

    info!("Creating Kafka consumer...");
    let consumer = OrderConsumer::new(
        &config.kafka.brokers,
        &config.kafka.group_id,
        &[&config.kafka.topic],
    )?;

    let (ingestion_trigger, ingestion_listener) = shutdown::channel();
    let ingestion = tokio::spawn(
        IngestionLoop::new(consumer, repository.clone(), cache.clone()).run(ingestion_listener),
    );

    let lookup = Arc::new(OrderLookup::new(cache, repository));
    let app = routes::create_router(AppState::new(lookup));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Order service listening on {}", addr);

    let (server_trigger, mut server_listener) = shutdown::channel();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_listener.triggered().await })
            .await
    });

    let coordinator = Coordinator::new(ingestion, ingestion_trigger, server, server_trigger);
    let outcome = coordinator
        .run(async {
            if let Some(signal) = signals.recv().await {
                info!("Received shutdown signal {}, stopping...", signal);
            }
        })
        .await;

    // Cleanup
    signals.close();
    pool.close().await;
    info!("Database pool closed");
    info!("Order service stopped");
    shutdown_telemetry();

    outcome
}

/// Connect to the store and load every stored order into a fresh cache
async fn connect_and_restore(
    config: &AppConfig,
) -> Result<(PgPool, Arc<dyn OrderRepository>, Arc<OrderCache>)> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url())
        .await
        .context("Failed to connect to database")?;
    info!("Database connected successfully");

    let repository: Arc<dyn OrderRepository> = Arc::new(PostgresOrderRepository::new(pool.clone()));
    let cache = Arc::new(OrderCache::new());

    // Restore before serving so the first lookups already see stored orders
    let restored = cache.restore_from_store(repository.as_ref()).await;
    info!("Cache warmed with {} orders", restored);

    Ok((pool, repository, cache))
}
