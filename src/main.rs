use duitku_gateway::api::{self, AppState};
use duitku_gateway::config::AppConfig;
use duitku_gateway::database::{
    init_pool_from_config, memory::InMemoryOrderRepository, order_repository::OrderRepository,
    order_repository::PgOrderRepository,
};
use duitku_gateway::health::HealthChecker;
use duitku_gateway::logging::init_tracing;
use duitku_gateway::middleware::logging::{request_logging_middleware, UuidRequestId};
use duitku_gateway::payments::{DuitkuClient, PaymentGateway};
use duitku_gateway::workers::expiry_worker::{ExpiryWorker, ExpiryWorkerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
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

    info!("shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;

    init_tracing(&config.logging, config.duitku.enable_logging);

    let settings = Arc::new(config.duitku.clone());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?settings.environment,
        inquiry_url = %settings.inquiry_url(),
        merchant_order_prefix = %settings.merchant_order_prefix,
        "starting duitku gateway"
    );

    let db_pool = init_pool_from_config(&config.database).await?;
    let orders: Arc<dyn OrderRepository> = match db_pool.clone() {
        Some(pool) => Arc::new(PgOrderRepository::new(pool)),
        None => {
            warn!("DATABASE_URL not set, orders are kept in memory");
            Arc::new(InMemoryOrderRepository::new())
        }
    };

    let gateway: Arc<dyn PaymentGateway> = Arc::new(DuitkuClient::new(&settings)?);
    let enabled_methods = settings.methods.iter().filter(|m| m.enabled).count();
    let health_checker = HealthChecker::new(db_pool, settings.environment, enabled_methods);

    let state = AppState::new(settings.clone(), gateway, orders, health_checker);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep_enabled = std::env::var("EXPIRY_SWEEP_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .to_lowercase()
        != "false";
    let sweep_handle = if sweep_enabled {
        let worker = ExpiryWorker::new(state.sweeper.clone(), ExpiryWorkerConfig::from_env());
        Some(tokio::spawn(worker.run(shutdown_rx.clone())))
    } else {
        info!("expiry sweep worker disabled (EXPIRY_SWEEP_ENABLED=false)");
        None
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(%addr, error = %e, "failed to bind");
        e
    })?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(shutdown_tx))
        .await?;

    if let Some(handle) = sweep_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "expiry sweep worker did not stop cleanly");
        }
    }

    info!("server stopped");
    Ok(())
}
