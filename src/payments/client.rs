use crate::config::DuitkuSettings;
use crate::middleware::logging::log_external_call;
use crate::payments::error::PaymentResult;
use crate::payments::inquiry::parse_inquiry_response;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{InquiryRequest, InquiryResponse};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// HTTP client for the Duitku merchant API.
pub struct DuitkuClient {
    http: PaymentHttpClient,
    inquiry_url: String,
}

impl DuitkuClient {
    /// The endpoint is fixed here, once per settings load.
    pub fn new(settings: &DuitkuSettings) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(settings.request_timeout_secs))?;
        Ok(Self {
            http,
            inquiry_url: settings.inquiry_url(),
        })
    }

    pub fn inquiry_url(&self) -> &str {
        &self.inquiry_url
    }
}

#[async_trait]
impl PaymentGateway for DuitkuClient {
    async fn create_inquiry(&self, request: &InquiryRequest) -> PaymentResult<InquiryResponse> {
        let raw = log_external_call(
            "duitku",
            "POST /merchant/v2/inquiry",
            self.http.post_json(&self.inquiry_url, request),
        )
        .await?;
        match parse_inquiry_response(&raw) {
            Ok(response) => {
                info!(
                    merchant_order_id = %request.merchant_order_id,
                    reference = response.reference.as_deref().unwrap_or(""),
                    "duitku inquiry accepted"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(
                    merchant_order_id = %request.merchant_order_id,
                    http_status = raw.status,
                    error = %e,
                    "duitku inquiry failed"
                );
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "duitku"
    }
}
