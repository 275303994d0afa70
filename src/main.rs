//! wallet-service - Wallet and Transaction Management API
//!
//! Backend service that tracks user wallet balances locally while an
//! external ledger provider remains the system of record for fund
//! movements.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_service::api::{self, AppState};
use wallet_service::jobs::ReconciliationSweeper;
use wallet_service::ledger::{ResilientLedger, RestLedgerClient};
use wallet_service::repository::{PostgresTransactionRepository, PostgresWalletRepository};
use wallet_service::{db, Config, WalletService};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application router
fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting wallet-service");
    tracing::info!("Connecting to database...");

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    // Verify database schema
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!(
        provider = config.ledger_provider.as_str(),
        "Database connected, using external ledger provider"
    );

    // Wire repositories, ledger client, and the wallet service
    let wallets = Arc::new(PostgresWalletRepository::new(pool.clone()));
    let transactions = Arc::new(PostgresTransactionRepository::new(pool.clone()));

    let rest_client = RestLedgerClient::with_timeout(
        config.ledger_provider,
        config.ledger_base_url.clone(),
        config.ledger_api_key.clone(),
        config.ledger_timeout,
    )?;
    let ledger = Arc::new(ResilientLedger::new(
        Arc::new(rest_client),
        config.resilience(),
    ));

    let service = Arc::new(
        WalletService::new(wallets, transactions, ledger)
            .with_persist_attempts(config.persist_attempts),
    );

    // Background reconciliation sweep
    let sweeper = ReconciliationSweeper::new(
        Arc::clone(&service),
        Duration::from_secs(config.reconciliation_interval_secs),
    );
    let sweeper_handle = sweeper.start();

    tracing::info!("Listening on http://{}", addr);

    // Build router and start server
    let app = build_router(AppState { service });

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    sweeper_handle.abort();
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
