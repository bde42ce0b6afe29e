//! In-process order store, used when no `DATABASE_URL` is configured and in tests.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::order_repository::{
    CallbackUpdate, Order, OrderNote, OrderRepository, PaymentAttachment,
};
use crate::payments::types::PaymentStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// All orders behind one lock, so every compare-and-set is atomic.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<i64, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(order_id: i64) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::NotFound {
        entity: "Order".to_string(),
        id: order_id.to_string(),
    })
}

fn note(text: &str) -> OrderNote {
    OrderNote {
        note: text.to_string(),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert_order(&self, order: &Order) -> Result<(), DatabaseError> {
        let mut orders = self.orders.lock().await;
        if orders.contains_key(&order.order_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::Conflict {
                message: format!("order {} already exists", order.order_id),
            }));
        }
        orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn find(&self, order_id: i64) -> Result<Option<Order>, DatabaseError> {
        Ok(self.orders.lock().await.get(&order_id).cloned())
    }

    async fn attach_payment(
        &self,
        order_id: i64,
        attachment: PaymentAttachment,
    ) -> Result<bool, DatabaseError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&order_id).ok_or_else(|| not_found(order_id))?;

        if order.status != PaymentStatus::Pending || order.payment.is_some() {
            return Ok(false);
        }

        let merchant_order_id = &attachment.record.merchant_order_id;
        let taken = orders.values().any(|o| {
            o.payment
                .as_ref()
                .is_some_and(|p| &p.merchant_order_id == merchant_order_id)
        });
        if taken {
            return Err(DatabaseError::new(DatabaseErrorKind::Conflict {
                message: format!("merchant order id {} already in use", merchant_order_id),
            }));
        }

        let order = orders.get_mut(&order_id).ok_or_else(|| not_found(order_id))?;
        if let Some(fee) = attachment.fee {
            order.total += fee.amount;
            order.fees.push(fee);
        }
        order.payment_method = Some(attachment.record.method_id.clone());
        order.payment = Some(attachment.record);
        order.notes.push(note(&attachment.note));
        Ok(true)
    }

    async fn apply_callback(
        &self,
        order_id: i64,
        update: CallbackUpdate,
    ) -> Result<bool, DatabaseError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(&order_id).ok_or_else(|| not_found(order_id))?;
        let payment = order.payment.as_mut().ok_or_else(|| {
            DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "DuitkuPayment".to_string(),
                id: order_id.to_string(),
            })
        })?;

        payment.callback_payload = Some(update.raw_payload);

        let target = match update.transition {
            Some(target) if order.status == PaymentStatus::Pending => target,
            _ => return Ok(false),
        };

        if let Some(settlement_date) = update.settlement_date {
            payment.settlement_date = Some(settlement_date);
        }
        order.status = target;
        if let Some(text) = &update.note {
            order.notes.push(note(text));
        }
        Ok(true)
    }

    async fn expire_if_due(
        &self,
        order_id: i64,
        now: DateTime<Utc>,
        note_text: &str,
    ) -> Result<bool, DatabaseError> {
        let mut orders = self.orders.lock().await;
        let Some(order) = orders.get_mut(&order_id) else {
            return Ok(false);
        };

        if !order.is_payment_overdue(now) {
            return Ok(false);
        }

        order.status = PaymentStatus::Expired;
        order.notes.push(note(note_text));
        Ok(true)
    }

    async fn cancel_pending(
        &self,
        order_id: i64,
        now: DateTime<Utc>,
        expired_note: &str,
        cancelled_note: &str,
    ) -> Result<Option<PaymentStatus>, DatabaseError> {
        let mut orders = self.orders.lock().await;
        let Some(order) = orders.get_mut(&order_id) else {
            return Ok(None);
        };
        if order.status != PaymentStatus::Pending {
            return Ok(None);
        }

        let (status, text) = if order.is_payment_overdue(now) {
            (PaymentStatus::Expired, expired_note)
        } else {
            (PaymentStatus::Cancelled, cancelled_note)
        };
        order.status = status;
        order.notes.push(note(text));
        Ok(Some(status))
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<i64>, DatabaseError> {
        let orders = self.orders.lock().await;
        let mut due: Vec<(DateTime<Utc>, i64)> = orders
            .values()
            .filter(|o| o.is_payment_overdue(now))
            .filter_map(|o| o.payment.as_ref().map(|p| (p.expires_at, o.order_id)))
            .collect();
        due.sort();
        Ok(due
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, id)| id)
            .collect())
    }
}
