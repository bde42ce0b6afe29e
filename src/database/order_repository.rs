use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::payments::types::{Address, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Buyer contact data copied from the host order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CustomerContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub billing: Address,
    pub shipping: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeLine {
    pub label: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderNote {
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// Duitku fields attached to an order once a transaction exists.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentRecord {
    pub merchant_order_id: String,
    pub reference: String,
    pub payment_url: Option<String>,
    pub va_number: Option<String>,
    pub qr_string: Option<String>,
    pub payment_code: Option<String>,
    pub method_id: String,
    pub payment_method_code: Option<String>,
    /// Integer amount sent as `paymentAmount` and signed.
    pub amount: i64,
    pub expires_at: DateTime<Utc>,
    pub callback_payload: Option<serde_json::Value>,
    pub settlement_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Order {
    pub order_id: i64,
    pub status: PaymentStatus,
    /// Grand total, fee lines included.
    pub total: Decimal,
    pub currency: String,
    pub customer: CustomerContact,
    pub item_names: Vec<String>,
    pub payment_method: Option<String>,
    pub fees: Vec<FeeLine>,
    pub notes: Vec<OrderNote>,
    pub payment: Option<PaymentRecord>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// A fresh host order without payment data.
    pub fn new(
        order_id: i64,
        total: Decimal,
        currency: impl Into<String>,
        customer: CustomerContact,
        item_names: Vec<String>,
    ) -> Self {
        Self {
            order_id,
            status: PaymentStatus::Pending,
            total,
            currency: currency.into(),
            customer,
            item_names,
            payment_method: None,
            fees: Vec::new(),
            notes: Vec::new(),
            payment: None,
            created_at: Utc::now(),
        }
    }

    pub fn product_details(&self) -> String {
        self.item_names.join(", ")
    }

    /// Pending with a payment whose expiry lies in the past.
    pub fn is_payment_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending
            && self.payment.as_ref().is_some_and(|p| now > p.expires_at)
    }
}

/// Everything written when a transaction is created, in one step.
#[derive(Debug, Clone)]
pub struct PaymentAttachment {
    pub record: PaymentRecord,
    pub fee: Option<FeeLine>,
    pub note: String,
}

/// Effects of one accepted callback, applied in one step.
#[derive(Debug, Clone)]
pub struct CallbackUpdate {
    pub raw_payload: serde_json::Value,
    /// Target status; only applied while the order is pending.
    pub transition: Option<PaymentStatus>,
    /// Written only when the transition happens.
    pub note: Option<String>,
    pub settlement_date: Option<String>,
}

/// Order state store. Every status write is a compare-and-set from `pending`.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Register a host order. Fails with a conflict when the id exists.
    async fn insert_order(&self, order: &Order) -> Result<(), DatabaseError>;

    async fn find(&self, order_id: i64) -> Result<Option<Order>, DatabaseError>;

    /// Attach payment data to a pending order without one.
    /// Returns `false` when the order is no longer eligible.
    async fn attach_payment(
        &self,
        order_id: i64,
        attachment: PaymentAttachment,
    ) -> Result<bool, DatabaseError>;

    /// Store the callback payload and, if still pending, apply the transition.
    /// Returns whether the status changed.
    async fn apply_callback(
        &self,
        order_id: i64,
        update: CallbackUpdate,
    ) -> Result<bool, DatabaseError>;

    /// `pending -> expired` when the payment expiry has passed.
    async fn expire_if_due(
        &self,
        order_id: i64,
        now: DateTime<Utc>,
        note: &str,
    ) -> Result<bool, DatabaseError>;

    /// Host cancellation: `pending -> expired` when the payment expiry has
    /// passed, `pending -> cancelled` otherwise. Returns the status written,
    /// `None` when the order was not pending.
    async fn cancel_pending(
        &self,
        order_id: i64,
        now: DateTime<Utc>,
        expired_note: &str,
        cancelled_note: &str,
    ) -> Result<Option<PaymentStatus>, DatabaseError>;

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<i64>, DatabaseError>;
}

#[derive(Debug, FromRow)]
struct OrderRow {
    order_id: i64,
    status: String,
    total: Decimal,
    currency: String,
    customer: Json<CustomerContact>,
    item_names: Json<Vec<String>>,
    payment_method: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FeeRow {
    label: String,
    amount: Decimal,
}

#[derive(Debug, FromRow)]
struct NoteRow {
    note: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    merchant_order_id: String,
    reference: String,
    payment_url: Option<String>,
    va_number: Option<String>,
    qr_string: Option<String>,
    payment_code: Option<String>,
    method_id: String,
    payment_method_code: Option<String>,
    amount: i64,
    expires_at: DateTime<Utc>,
    callback_payload: Option<serde_json::Value>,
    settlement_date: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        PaymentRecord {
            merchant_order_id: row.merchant_order_id,
            reference: row.reference,
            payment_url: row.payment_url,
            va_number: row.va_number,
            qr_string: row.qr_string,
            payment_code: row.payment_code,
            method_id: row.method_id,
            payment_method_code: row.payment_method_code,
            amount: row.amount,
            expires_at: row.expires_at,
            callback_payload: row.callback_payload,
            settlement_date: row.settlement_date,
            created_at: row.created_at,
        }
    }
}

/// Postgres-backed order store
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_order(&self, order: &Order) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO orders
             (order_id, status, total, currency, customer, item_names, payment_method, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.order_id)
        .bind(order.status.as_str())
        .bind(order.total)
        .bind(&order.currency)
        .bind(Json(&order.customer))
        .bind(Json(&order.item_names))
        .bind(&order.payment_method)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn find(&self, order_id: i64) -> Result<Option<Order>, DatabaseError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT order_id, status, total, currency, customer, item_names, payment_method, created_at
             FROM orders WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fees = sqlx::query_as::<_, FeeRow>(
            "SELECT label, amount FROM order_fees WHERE order_id = $1 ORDER BY id ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let notes = sqlx::query_as::<_, NoteRow>(
            "SELECT note, created_at FROM order_notes WHERE order_id = $1 ORDER BY id ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let payment = sqlx::query_as::<_, PaymentRow>(
            "SELECT merchant_order_id, reference, payment_url, va_number, qr_string, payment_code,
                    method_id, payment_method_code, amount, expires_at, callback_payload,
                    settlement_date, created_at
             FROM duitku_payments WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let status = PaymentStatus::from_str(&row.status).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Unknown {
                message: format!("order {}: {}", order_id, e),
            })
        })?;

        Ok(Some(Order {
            order_id: row.order_id,
            status,
            total: row.total,
            currency: row.currency,
            customer: row.customer.0,
            item_names: row.item_names.0,
            payment_method: row.payment_method,
            fees: fees
                .into_iter()
                .map(|f| FeeLine {
                    label: f.label,
                    amount: f.amount,
                })
                .collect(),
            notes: notes
                .into_iter()
                .map(|n| OrderNote {
                    note: n.note,
                    created_at: n.created_at,
                })
                .collect(),
            payment: payment.map(PaymentRecord::from),
            created_at: row.created_at,
        }))
    }

    async fn attach_payment(
        &self,
        order_id: i64,
        attachment: PaymentAttachment,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        match status.as_deref() {
            None => {
                tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
                return Err(DatabaseError::new(DatabaseErrorKind::NotFound {
                    entity: "Order".to_string(),
                    id: order_id.to_string(),
                }));
            }
            Some("pending") => {}
            Some(_) => {
                tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
                return Ok(false);
            }
        }

        let record = &attachment.record;
        let inserted = sqlx::query(
            "INSERT INTO duitku_payments
             (order_id, merchant_order_id, reference, payment_url, va_number, qr_string,
              payment_code, method_id, payment_method_code, amount, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(order_id)
        .bind(&record.merchant_order_id)
        .bind(&record.reference)
        .bind(&record.payment_url)
        .bind(&record.va_number)
        .bind(&record.qr_string)
        .bind(&record.payment_code)
        .bind(&record.method_id)
        .bind(&record.payment_method_code)
        .bind(record.amount)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(false);
        }

        if let Some(fee) = &attachment.fee {
            sqlx::query("INSERT INTO order_fees (order_id, label, amount) VALUES ($1, $2, $3)")
                .bind(order_id)
                .bind(&fee.label)
                .bind(fee.amount)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        }

        sqlx::query(
            "UPDATE orders
             SET payment_method = $2, total = total + $3, updated_at = NOW()
             WHERE order_id = $1",
        )
        .bind(order_id)
        .bind(&record.method_id)
        .bind(attachment.fee.as_ref().map(|f| f.amount).unwrap_or(Decimal::ZERO))
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        sqlx::query("INSERT INTO order_notes (order_id, note) VALUES ($1, $2)")
            .bind(order_id)
            .bind(&attachment.note)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(true)
    }

    async fn apply_callback(
        &self,
        order_id: i64,
        update: CallbackUpdate,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let stored = sqlx::query(
            "UPDATE duitku_payments SET callback_payload = $2 WHERE order_id = $1",
        )
        .bind(order_id)
        .bind(&update.raw_payload)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if stored.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Err(DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "DuitkuPayment".to_string(),
                id: order_id.to_string(),
            }));
        }

        let mut transitioned = false;
        if let Some(target) = update.transition {
            let result = sqlx::query(
                "UPDATE orders SET status = $2, updated_at = NOW()
                 WHERE order_id = $1 AND status = 'pending'",
            )
            .bind(order_id)
            .bind(target.as_str())
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
            transitioned = result.rows_affected() > 0;
        }

        if transitioned {
            if let Some(note) = &update.note {
                sqlx::query("INSERT INTO order_notes (order_id, note) VALUES ($1, $2)")
                    .bind(order_id)
                    .bind(note)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::from_sqlx)?;
            }
            if let Some(settlement_date) = &update.settlement_date {
                sqlx::query("UPDATE duitku_payments SET settlement_date = $2 WHERE order_id = $1")
                    .bind(order_id)
                    .bind(settlement_date)
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::from_sqlx)?;
            }
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(transitioned)
    }

    async fn expire_if_due(
        &self,
        order_id: i64,
        now: DateTime<Utc>,
        note: &str,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let result = sqlx::query(
            "UPDATE orders o SET status = 'expired', updated_at = NOW()
             FROM duitku_payments p
             WHERE o.order_id = $1 AND p.order_id = o.order_id
               AND o.status = 'pending' AND p.expires_at < $2",
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let expired = result.rows_affected() > 0;
        if expired {
            sqlx::query("INSERT INTO order_notes (order_id, note) VALUES ($1, $2)")
                .bind(order_id)
                .bind(note)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(expired)
    }

    async fn cancel_pending(
        &self,
        order_id: i64,
        now: DateTime<Utc>,
        expired_note: &str,
        cancelled_note: &str,
    ) -> Result<Option<PaymentStatus>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let written: Option<String> = sqlx::query_scalar(
            "UPDATE orders o SET status = CASE
                 WHEN EXISTS (SELECT 1 FROM duitku_payments p
                              WHERE p.order_id = o.order_id AND p.expires_at < $2)
                 THEN 'expired' ELSE 'cancelled' END,
               updated_at = NOW()
             WHERE o.order_id = $1 AND o.status = 'pending'
             RETURNING o.status",
        )
        .bind(order_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(written) = written else {
            tx.commit().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(None);
        };
        let status = PaymentStatus::from_str(&written).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Unknown {
                message: format!("order {}: {}", order_id, e),
            })
        })?;
        let note = match status {
            PaymentStatus::Expired => expired_note,
            _ => cancelled_note,
        };

        sqlx::query("INSERT INTO order_notes (order_id, note) VALUES ($1, $2)")
            .bind(order_id)
            .bind(note)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(Some(status))
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<i64>, DatabaseError> {
        sqlx::query_scalar(
            "SELECT o.order_id FROM orders o
             JOIN duitku_payments p ON p.order_id = o.order_id
             WHERE o.status = 'pending' AND p.expires_at < $1
             ORDER BY p.expires_at ASC
             LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
