//! Request logging and request-id generation

use axum::{extract::Request, middleware::Next, response::Response};
use http::{HeaderValue, Request as HttpRequest};
use std::future::Future;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Generates a v4 UUID `x-request-id` for every request that lacks one.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &HttpRequest<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Wraps each request in a span carrying the request id and logs its outcome.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!("http_request", %request_id, %method, %path);
    let start = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if status.is_server_error() {
            warn!(status = status.as_u16(), latency_ms, "request failed");
        } else {
            info!(status = status.as_u16(), latency_ms, "request completed");
        }
    });

    response
}

/// Time an outbound call and log its outcome.
pub async fn log_external_call<F, T, E>(service: &str, operation: &str, call: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let result = call.await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match &result {
        Ok(_) => info!(service, operation, duration_ms, "external call succeeded"),
        Err(e) => warn!(service, operation, duration_ms, error = %e, "external call failed"),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique_uuids() {
        let request = HttpRequest::builder().body(()).unwrap();
        let mut maker = UuidRequestId;
        let a = maker.make_request_id(&request).unwrap();
        let b = maker.make_request_id(&request).unwrap();
        let a = a.header_value().to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&a).is_ok());
        assert_ne!(a, b.header_value().to_str().unwrap());
    }

    #[tokio::test]
    async fn external_call_result_is_passed_through() {
        let ok: Result<u8, String> = log_external_call("duitku", "inquiry", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        let err: Result<u8, String> =
            log_external_call("duitku", "inquiry", async { Err("timeout".to_string()) }).await;
        assert!(err.is_err());
    }
}
