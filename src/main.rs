//! VIP Orders service entry point.
//!
//! Loads configuration, connects to PostgreSQL, wires the adapters and serves
//! the HTTP API while the reconciliation scheduler runs in the background.

use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vip_orders::adapters::gateway::{WalletAGateway, WalletBGateway};
use vip_orders::adapters::http::{api_router, OrdersAppState};
use vip_orders::adapters::notifier::TracingNotifier;
use vip_orders::adapters::postgres::{
    PostgresAccountDirectory, PostgresAuditLog, PostgresCallbackRecords,
    PostgresEntitlementStore, PostgresOrderRepository, PostgresPackageCatalog,
};
use vip_orders::adapters::{ReconciliationScheduler, SchedulerConfig};
use vip_orders::application::{
    EntitlementApplier, GatewayRegistry, PaymentSettlement, ReconciliationService,
};
use vip_orders::config::{AppConfig, ConfigError, ValidationError};
use vip_orders::domain::payment::GatewayError;
use vip_orders::domain::security::SecurityGate;

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Payment provider setup failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config)?;

    tracing::info!(
        environment = ?config.server.environment,
        "Starting vip-orders"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(config.database.url.expose_secret())
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let mut registry = GatewayRegistry::new();
    if let Some(wallet_a) = config.gateway.wallet_a_config() {
        registry = registry.register(Arc::new(WalletAGateway::new(wallet_a)?));
    }
    if let Some(wallet_b) = config.gateway.wallet_b_config() {
        registry = registry.register(Arc::new(WalletBGateway::new(wallet_b)?));
    }
    if registry.providers().is_empty() {
        tracing::warn!("No payment providers configured; payments will be rejected");
    } else {
        tracing::info!(providers = ?registry.providers(), "Payment providers registered");
    }

    let catalog = Arc::new(PostgresPackageCatalog::new(pool.clone()));
    let accounts = Arc::new(PostgresAccountDirectory::new(pool.clone()));
    let callbacks = Arc::new(PostgresCallbackRecords::new(pool.clone()));
    let applier = EntitlementApplier::new(
        Arc::new(PostgresEntitlementStore::new(pool.clone())),
        catalog.clone(),
    );
    let settlement = Arc::new(PaymentSettlement::new(
        Arc::new(PostgresOrderRepository::new(pool.clone())),
        registry,
        applier,
        Arc::new(TracingNotifier::new()),
        Arc::new(PostgresAuditLog::new(pool)),
    ));
    let reconciliation = Arc::new(ReconciliationService::new(
        settlement.clone(),
        config.reconciliation.policy(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = if config.reconciliation.enabled {
        let scheduler = ReconciliationScheduler::new(
            reconciliation.clone(),
            SchedulerConfig::default().with_interval(config.reconciliation.interval()),
        );
        Some(tokio::spawn(async move { scheduler.run(shutdown_rx).await }))
    } else {
        tracing::warn!("Reconciliation scheduler disabled");
        None
    };

    let state = OrdersAppState::new(
        settlement,
        reconciliation,
        catalog,
        accounts.clone(),
        accounts,
        callbacks,
        SecurityGate::new(config.security.policy()),
        config.orders.policy(),
    );
    let app = api_router(state, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // A send error only means the scheduler already stopped
    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Reconciliation scheduler task failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// JSON logs in production, human-readable output elsewhere. `RUST_LOG`
/// overrides the configured filter.
fn init_tracing(config: &AppConfig) -> Result<(), StartupError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .map_err(|e| StartupError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.is_production() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| StartupError::Logging(e.to_string()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        // Without a signal handler, never trigger shutdown
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
