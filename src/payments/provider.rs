use crate::payments::error::PaymentResult;
use crate::payments::types::{InquiryRequest, InquiryResponse};
use async_trait::async_trait;

/// Outbound side of the aggregator.
///
/// Implementations return only responses whose `statusCode` is `"00"`;
/// everything else comes back as a `PaymentError`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_inquiry(&self, request: &InquiryRequest) -> PaymentResult<InquiryResponse>;

    fn name(&self) -> &'static str;
}
