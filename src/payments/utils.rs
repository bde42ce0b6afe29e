use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Raw answer from the gateway: HTTP status plus the unparsed body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Thin JSON-over-HTTP client with a bounded timeout and no automatic retry.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::Transport {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self { client, timeout })
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> PaymentResult<RawResponse> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "gateway request failed");
                PaymentError::Transport {
                    message: format!("gateway request failed: {}", e),
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| PaymentError::Transport {
            message: format!("failed to read gateway response: {}", e),
        })?;

        Ok(RawResponse { status, body })
    }
}

/// Equality whose running time does not depend on where the inputs differ.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
