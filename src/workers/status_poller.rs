//! Buyer-side payment status poller.
//!
//! Checks once immediately, then at a fixed interval, until the order reaches
//! a terminal status or the shutdown signal fires. On a terminal status the
//! page is sent to the redirect URL exactly once.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::payments::types::PaymentStatus;

/// One answer of the status endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("status request failed: {0}")]
    Request(String),
    #[error("invalid status response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, order_id: &str, nonce: &str) -> Result<StatusSnapshot, PollError>;
}

/// The page the poller drives.
pub trait BuyerPage: Send + Sync {
    fn show_message(&self, _message: &str) {}

    fn navigate(&self, url: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No order id on the page; nothing was requested.
    MissingOrderId,
    Terminal {
        status: PaymentStatus,
        redirected: bool,
    },
    Shutdown,
}

pub struct StatusPoller<S, P> {
    source: S,
    page: P,
    interval: Duration,
}

impl<S: StatusSource, P: BuyerPage> StatusPoller<S, P> {
    pub fn new(source: S, page: P, interval: Duration) -> Self {
        Self {
            source,
            page,
            interval,
        }
    }

    pub async fn run(
        &self,
        order_id: Option<&str>,
        nonce: &str,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> PollOutcome {
        let Some(order_id) = order_id.map(str::trim).filter(|id| !id.is_empty()) else {
            warn!("order id missing, status polling not started");
            return PollOutcome::MissingOrderId;
        };

        // The first tick completes immediately.
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!(order_id, "status polling stopped");
                        return PollOutcome::Shutdown;
                    }
                }
                _ = ticker.tick() => {
                    if let Some(outcome) = self.check_once(order_id, nonce).await {
                        return outcome;
                    }
                }
            }
        }
    }

    async fn check_once(&self, order_id: &str, nonce: &str) -> Option<PollOutcome> {
        let snapshot = match self.source.fetch(order_id, nonce).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(order_id, error = %e, "status check failed");
                return None;
            }
        };

        if let Some(message) = snapshot.message.as_deref().filter(|m| !m.is_empty()) {
            self.page.show_message(message);
        }

        let status = match PaymentStatus::from_str(&snapshot.status) {
            Ok(status) => status,
            Err(_) => {
                warn!(order_id, status = %snapshot.status, "unexpected payment status");
                return None;
            }
        };

        if !status.is_terminal() {
            debug!(order_id, "payment still pending");
            return None;
        }

        let redirect = snapshot
            .redirect_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());
        if let Some(url) = redirect {
            self.page.navigate(url);
        }
        info!(order_id, status = %status, redirected = redirect.is_some(), "payment reached terminal status");

        Some(PollOutcome::Terminal {
            status,
            redirected: redirect.is_some(),
        })
    }
}

/// Calls the gateway's `POST /api/payments/status` endpoint.
pub struct HttpStatusSource {
    client: Client,
    endpoint: String,
}

impl HttpStatusSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PollError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PollError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, order_id: &str, nonce: &str) -> Result<StatusSnapshot, PollError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "order_id": order_id, "nonce": nonce }))
            .send()
            .await
            .map_err(|e| PollError::Request(e.to_string()))?;

        // Error answers share the shape, with status "unknown".
        response
            .json::<StatusSnapshot>()
            .await
            .map_err(|e| PollError::InvalidResponse(e.to_string()))
    }
}
