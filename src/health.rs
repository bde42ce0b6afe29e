//! Health check module
//! Reports the state of the order store and the Duitku configuration

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::database::{self, error::DatabaseError};
use crate::payments::types::Environment;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }

    /// Recompute the overall state from the component checks.
    fn settle(&mut self) {
        let states: Vec<&ComponentState> = self.checks.values().map(|c| &c.status).collect();
        self.status = if states.contains(&&ComponentState::Down) {
            HealthState::Unhealthy
        } else if states.contains(&&ComponentState::Warning) {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: Option<sqlx::PgPool>,
    environment: Environment,
    enabled_methods: usize,
}

impl HealthChecker {
    pub fn new(db_pool: Option<sqlx::PgPool>, environment: Environment, enabled_methods: usize) -> Self {
        Self {
            db_pool,
            environment,
            enabled_methods,
        }
    }

    /// Perform comprehensive health check
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();

        match &self.db_pool {
            Some(pool) => {
                let check = match timeout(Duration::from_secs(5), timed_database_check(pool)).await {
                    Ok(Ok(response_time)) => {
                        info!(response_time_ms = response_time as u64, "database health check ok");
                        ComponentHealth::up(Some(response_time))
                    }
                    Ok(Err(e)) => {
                        error!(error = %e, "database health check failed");
                        ComponentHealth::down(Some(e.to_string()))
                    }
                    Err(_) => {
                        error!("database health check timed out");
                        ComponentHealth::down(Some("Timeout".to_string()))
                    }
                };
                health_status.checks.insert("order_store".to_string(), check);
            }
            None => {
                health_status.checks.insert(
                    "order_store".to_string(),
                    ComponentHealth {
                        status: ComponentState::Up,
                        response_time_ms: None,
                        details: Some("in-memory".to_string()),
                    },
                );
            }
        }

        let duitku = if self.enabled_methods == 0 {
            ComponentHealth::down(Some("no payment method enabled".to_string()))
        } else if self.environment == Environment::Development {
            ComponentHealth::warning(None, Some("sandbox endpoint in use".to_string()))
        } else {
            ComponentHealth::up(None)
        };
        health_status.checks.insert("duitku".to_string(), duitku);

        health_status.settle();
        health_status
    }
}

async fn timed_database_check(pool: &sqlx::PgPool) -> Result<u128, DatabaseError> {
    let start = Instant::now();
    database::health_check(pool).await?;
    Ok(start.elapsed().as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_status_creation() {
        let health_status = HealthStatus::new();
        assert!(matches!(health_status.status, HealthState::Healthy));
        assert!(health_status.checks.is_empty());
        assert!(health_status.timestamp <= chrono::Utc::now());
    }

    #[test]
    fn test_component_health_states() {
        let up_health = ComponentHealth::up(Some(100));
        assert!(matches!(up_health.status, ComponentState::Up));
        assert_eq!(up_health.response_time_ms, Some(100));

        let down_health = ComponentHealth::down(Some("Test error".to_string()));
        assert!(matches!(down_health.status, ComponentState::Down));
        assert_eq!(down_health.details, Some("Test error".to_string()));
    }

    #[tokio::test]
    async fn sandbox_in_memory_is_degraded() {
        let status = HealthChecker::new(None, Environment::Development, 5)
            .check_health()
            .await;
        assert_eq!(status.status, HealthState::Degraded);
        assert_eq!(status.checks["order_store"].status, ComponentState::Up);
    }

    #[tokio::test]
    async fn production_in_memory_is_healthy() {
        let status = HealthChecker::new(None, Environment::Production, 1)
            .check_health()
            .await;
        assert!(status.is_healthy());

        let status = HealthChecker::new(None, Environment::Production, 0)
            .check_health()
            .await;
        assert_eq!(status.status, HealthState::Unhealthy);
    }
}
