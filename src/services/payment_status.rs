use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::DuitkuSettings;
use crate::database::order_repository::{Order, OrderRepository};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::PaymentStatus;
use crate::services::expiry::ExpirySweeper;
use crate::services::nonce::NonceIssuer;

/// Answer of the buyer-facing status endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: PaymentStatus,
    pub message: String,
    pub redirect_url: String,
}

/// Data the host payment page renders and hands to the poller.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentDetails {
    pub order_id: i64,
    pub status: PaymentStatus,
    pub method_id: String,
    pub method_title: Option<String>,
    pub reference: String,
    pub amount: i64,
    pub currency: String,
    pub payment_url: Option<String>,
    pub va_number: Option<String>,
    pub qr_string: Option<String>,
    pub payment_code: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub status_endpoint: String,
    pub check_interval_ms: u64,
}

pub struct PaymentStatusService {
    settings: Arc<DuitkuSettings>,
    orders: Arc<dyn OrderRepository>,
    sweeper: Arc<ExpirySweeper>,
    nonces: NonceIssuer,
}

impl PaymentStatusService {
    pub fn new(
        settings: Arc<DuitkuSettings>,
        orders: Arc<dyn OrderRepository>,
        sweeper: Arc<ExpirySweeper>,
    ) -> Self {
        let nonces = NonceIssuer::new(&settings.nonce_secret);
        Self {
            settings,
            orders,
            sweeper,
            nonces,
        }
    }

    pub async fn check(
        &self,
        order_id: Option<i64>,
        nonce: Option<&str>,
        now: DateTime<Utc>,
    ) -> PaymentResult<StatusReport> {
        let nonce = nonce
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PaymentError::authentication("Invalid security token"))?;
        let order_id = order_id
            .filter(|id| *id > 0)
            .ok_or_else(|| PaymentError::validation("Order ID is required", Some("order_id")))?;
        if !self.nonces.verify(nonce, order_id, now) {
            return Err(PaymentError::authentication("Invalid security token"));
        }

        let order = self.load_current(order_id, now).await?;
        let report = self.report(&order);
        debug!(order_id, status = %report.status, "payment status checked");
        Ok(report)
    }

    pub async fn details(&self, order_id: i64, now: DateTime<Utc>) -> PaymentResult<PaymentDetails> {
        let order = self.load_current(order_id, now).await?;
        let Some(payment) = order.payment else {
            return Err(PaymentError::validation(
                "Invalid payment method",
                Some("order_id"),
            ));
        };

        Ok(PaymentDetails {
            order_id,
            status: order.status,
            method_title: self
                .settings
                .method(&payment.method_id)
                .map(|m| m.title.clone()),
            method_id: payment.method_id,
            reference: payment.reference,
            amount: payment.amount,
            currency: order.currency,
            payment_url: payment.payment_url,
            va_number: payment.va_number,
            qr_string: payment.qr_string,
            payment_code: payment.payment_code,
            expires_at: payment.expires_at,
            nonce: self.nonces.issue(order_id, now),
            status_endpoint: self.settings.storefront.status_endpoint(),
            check_interval_ms: self.settings.check_interval_ms,
        })
    }

    /// Load the order, expiring it first if its payment window has passed.
    async fn load_current(&self, order_id: i64, now: DateTime<Utc>) -> PaymentResult<Order> {
        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Order not found"))?;

        if order.payment.is_none() {
            return Err(PaymentError::validation(
                "Invalid payment method",
                Some("order_id"),
            ));
        }

        if !order.is_payment_overdue(now) {
            return Ok(order);
        }

        self.sweeper.sweep(order_id, now).await?;
        self.orders
            .find(order_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Order not found"))
    }

    fn report(&self, order: &Order) -> StatusReport {
        let storefront = &self.settings.storefront;
        let (message, redirect_url) = match order.status {
            PaymentStatus::Completed => (
                "Payment completed!".to_string(),
                storefront.order_received_url(order.order_id),
            ),
            PaymentStatus::Cancelled => (
                "Payment cancelled or expired".to_string(),
                storefront.checkout_url(),
            ),
            PaymentStatus::Expired => (
                "Payment period has expired".to_string(),
                storefront.checkout_url(),
            ),
            PaymentStatus::Pending => {
                let va = order.payment.as_ref().and_then(|p| p.va_number.as_deref());
                let message = match va {
                    Some(va) => format!("Waiting for payment to VA: {}", va),
                    None => "Waiting for payment...".to_string(),
                };
                (message, String::new())
            }
        };

        StatusReport {
            status: order.status,
            message,
            redirect_url,
        }
    }
}
