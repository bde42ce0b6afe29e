pub mod error;
pub mod memory;
pub mod order_repository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error as log_error, info, warn};

use self::error::{DatabaseError, DatabaseErrorKind};
use crate::config::DatabaseConfig;

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Initialize the database connection pool and apply pending migrations
pub async fn init_pool(
    database_url: &str,
    config: Option<PoolConfig>,
) -> Result<PgPool, DatabaseError> {
    let config = config.unwrap_or_default();

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connection_timeout = ?config.connection_timeout,
        "initializing database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!(error = %e, "failed to initialize database pool");
            DatabaseError::from_sqlx(e)
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        log_error!(error = %e, "database migration failed");
        DatabaseError::new(DatabaseErrorKind::Unknown {
            message: e.to_string(),
        })
    })?;

    info!("database pool initialized");
    Ok(pool)
}

/// Connection pool health check
pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "database health check failed");
        DatabaseError::from_sqlx(e)
    })?;

    Ok(())
}

/// Initialize the database pool from application configuration.
/// `None` when no database URL is configured.
pub async fn init_pool_from_config(
    config: &DatabaseConfig,
) -> Result<Option<PgPool>, DatabaseError> {
    let Some(url) = &config.url else {
        return Ok(None);
    };

    let pool_config = PoolConfig {
        max_connections: config.max_connections,
        min_connections: config.min_connections,
        connection_timeout: Duration::from_secs(config.connection_timeout),
        ..PoolConfig::default()
    };

    init_pool(url, Some(pool_config)).await.map(Some)
}
