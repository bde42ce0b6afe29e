use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::order_repository::OrderRepository;
use crate::payments::error::PaymentResult;
use crate::payments::types::PaymentStatus;

pub const EXPIRED_NOTE: &str = "Order cancelled due to payment expiration.";
pub const HOST_CANCELLED_NOTE: &str = "Order cancelled by the store.";

/// Moves pending orders whose payment window has passed to `expired`.
pub struct ExpirySweeper {
    orders: Arc<dyn OrderRepository>,
}

impl ExpirySweeper {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    /// Returns `true` when this call expired the order.
    pub async fn sweep(&self, order_id: i64, now: DateTime<Utc>) -> PaymentResult<bool> {
        let expired = self.orders.expire_if_due(order_id, now, EXPIRED_NOTE).await?;
        if expired {
            info!(order_id, "order expired");
        }
        Ok(expired)
    }

    /// Host cancellation hook. A pending order follows the host: `expired`
    /// when its payment window has passed, `cancelled` otherwise. Returns the
    /// status written, `None` when the order was already terminal or unknown.
    pub async fn on_order_cancelled(
        &self,
        order_id: i64,
        now: DateTime<Utc>,
    ) -> PaymentResult<Option<PaymentStatus>> {
        let written = self
            .orders
            .cancel_pending(order_id, now, EXPIRED_NOTE, HOST_CANCELLED_NOTE)
            .await?;
        if let Some(status) = written {
            info!(order_id, status = %status, "order closed by host cancellation");
        }
        Ok(written)
    }

    /// Expire up to `batch_size` overdue orders; returns how many changed.
    pub async fn sweep_due(&self, now: DateTime<Utc>, batch_size: i64) -> PaymentResult<usize> {
        let due = self.orders.list_expired_pending(now, batch_size).await?;
        let mut expired = 0;
        for order_id in due {
            match self.sweep(order_id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => warn!(order_id, error = %e, "failed to expire order"),
            }
        }
        Ok(expired)
    }
}
