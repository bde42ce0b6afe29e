use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::services::expiry::ExpirySweeper;

#[derive(Debug, Clone)]
pub struct ExpiryWorkerConfig {
    pub interval: Duration,
    pub batch_size: i64,
}

impl Default for ExpiryWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 100,
        }
    }
}

impl ExpiryWorkerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: Duration::from_secs(
                std::env::var("EXPIRY_SWEEP_INTERVAL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(defaults.interval.as_secs()),
            ),
            batch_size: std::env::var("EXPIRY_SWEEP_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.batch_size),
        }
    }
}

/// Periodically expires pending orders whose payment window has passed.
pub struct ExpiryWorker {
    sweeper: Arc<ExpirySweeper>,
    config: ExpiryWorkerConfig,
}

impl ExpiryWorker {
    pub fn new(sweeper: Arc<ExpirySweeper>, config: ExpiryWorkerConfig) -> Self {
        Self { sweeper, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "expiry sweep worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    self.run_cycle().await;
                }
            }
        }

        info!("expiry sweep worker stopped");
    }

    async fn run_cycle(&self) -> usize {
        match self
            .sweeper
            .sweep_due(Utc::now(), self.config.batch_size)
            .await
        {
            Ok(count) => {
                if count > 0 {
                    info!(expired = count, "expired overdue orders");
                }
                count
            }
            Err(e) => {
                error!(error = %e, "expiry sweep failed");
                0
            }
        }
    }
}
