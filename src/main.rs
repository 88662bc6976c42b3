use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};

use tourbook_payments::api::{self, payments::PaymentsState, ApiState};
use tourbook_payments::config::{AppConfig, SignatureMode};
use tourbook_payments::database::{
    self, memory::InMemorySettlementStore, settlement_repository::PgSettlementStore,
};
use tourbook_payments::health::HealthChecker;
use tourbook_payments::logging::{init_tracing, mask_secret};
use tourbook_payments::payments::provider::PaymentProvider;
use tourbook_payments::payments::providers::MomoProvider;
use tourbook_payments::payments::store::SettlementStore;
use tourbook_payments::services::{
    CallbackProcessor, PaymentInitiator, PaymentStatusService, RefundInitiator,
};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting tour booking payment service"
    );
    info!(
        partner_code = %config.gateway.partner_code,
        access_key = %mask_secret(&config.gateway.access_key),
        endpoint = %config.gateway.endpoint,
        signature_mode = config.gateway.signature_mode.as_str(),
        currency = %config.settlement.currency,
        "Gateway configuration loaded"
    );
    if config.gateway.signature_mode == SignatureMode::Sandbox {
        warn!("MOMO_SIGNATURE_MODE=sandbox: callback signatures are NOT enforced");
    }

    // Initialize the settlement store
    let (store, db_pool) = match &config.database {
        Some(db_config) => {
            info!("Initializing database connection pool...");
            let pool = database::init_pool_from_config(db_config)
                .await
                .map_err(|e| {
                    error!("Failed to initialize database pool: {}", e);
                    e
                })?;
            if db_config.run_migrations {
                database::run_migrations(&pool).await?;
            }
            info!(
                max_connections = pool.options().get_max_connections(),
                "Database connection pool initialized"
            );
            let store: Arc<dyn SettlementStore> = Arc::new(PgSettlementStore::new(pool.clone()));
            (store, Some(pool))
        }
        None => {
            warn!("SKIP_EXTERNALS=true: using the in-memory settlement store");
            let store: Arc<dyn SettlementStore> = Arc::new(InMemorySettlementStore::new());
            (store, None)
        }
    };

    let provider: Arc<dyn PaymentProvider> = Arc::new(MomoProvider::new(config.gateway.clone())?);

    let state = ApiState {
        payments: PaymentsState {
            initiator: Arc::new(PaymentInitiator::new(
                store.clone(),
                provider.clone(),
                config.settlement.clone(),
            )),
            refunds: Arc::new(RefundInitiator::new(store.clone(), provider.clone())),
            status: Arc::new(PaymentStatusService::new(store.clone())),
        },
        callbacks: Arc::new(CallbackProcessor::new(
            store,
            provider,
            config.gateway.signature_mode,
        )),
        health: HealthChecker::new(db_pool),
    };

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(address = %addr, error = %e, "Failed to bind server address");
        e
    })?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}
