//! Transaction lifecycle: turns a pending order into a Duitku transaction
//! and tells the checkout where to send the buyer.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::DuitkuSettings;
use crate::database::order_repository::{
    FeeLine, Order, OrderRepository, PaymentAttachment, PaymentRecord,
};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::inquiry::accept_for_method;
use crate::payments::methods::PaymentMethodDescriptor;
use crate::payments::provider::PaymentGateway;
use crate::payments::signature::outbound_signature;
use crate::payments::types::{CustomerDetail, InquiryRequest, PaymentStatus};
use crate::services::expiry::ExpirySweeper;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub order_id: i64,
    pub redirect: String,
    /// The order already had a live transaction; no request was sent.
    pub reused: bool,
}

pub struct TransactionService {
    settings: Arc<DuitkuSettings>,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderRepository>,
    sweeper: ExpirySweeper,
}

impl TransactionService {
    pub fn new(
        settings: Arc<DuitkuSettings>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            settings,
            gateway,
            sweeper: ExpirySweeper::new(orders.clone()),
            orders,
        }
    }

    pub async fn create_transaction(
        &self,
        order_id: i64,
        method_id: &str,
        now: DateTime<Utc>,
    ) -> PaymentResult<CheckoutRedirect> {
        let method = self
            .settings
            .method(method_id.trim())
            .filter(|m| m.enabled)
            .ok_or_else(|| {
                PaymentError::validation("Unsupported payment method", Some("payment_method"))
            })?;

        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Order not found"))?;

        if order.payment.is_some() {
            return self.existing_redirect(&order, now).await;
        }
        if order.status != PaymentStatus::Pending {
            return Err(PaymentError::validation(
                "Order is no longer awaiting payment",
                Some("order_id"),
            ));
        }

        let fee = method.fee.apply(order.total);
        let amount = (order.total + fee)
            .trunc()
            .to_i64()
            .filter(|a| *a > 0)
            .ok_or_else(|| PaymentError::validation("Invalid order amount", Some("amount")))?;
        let merchant_order_id = self.settings.merchant_order_id(order_id);
        let expiry_minutes = method.effective_expiry_minutes(self.settings.expiry_minutes);

        let request = self.build_inquiry(&order, method, &merchant_order_id, amount, expiry_minutes);

        let response = match self.gateway.create_inquiry(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    order_id,
                    method = %method.id,
                    gateway = self.gateway.name(),
                    error = %e,
                    "transaction creation failed"
                );
                return Err(e);
            }
        };

        let created = accept_for_method(response, method).map_err(|e| {
            warn!(order_id, method = %method.id, error = %e, "inquiry response incomplete");
            e
        })?;

        let record = PaymentRecord {
            merchant_order_id,
            reference: created.reference.clone(),
            payment_url: created.payment_url.clone(),
            va_number: created.va_number,
            qr_string: created.qr_string,
            payment_code: created.payment_code,
            method_id: method.id.clone(),
            payment_method_code: method.payment_code.clone(),
            amount,
            expires_at: now + Duration::minutes(i64::from(expiry_minutes)),
            callback_payload: None,
            settlement_date: None,
            created_at: now,
        };
        let attachment = PaymentAttachment {
            record,
            fee: (fee > rust_decimal::Decimal::ZERO).then(|| FeeLine {
                label: method.fee_label(),
                amount: fee,
            }),
            note: format!("Awaiting payment via Duitku. Reference: {}", created.reference),
        };

        if !self.orders.attach_payment(order_id, attachment).await? {
            // Another checkout for the same order won the race.
            let order = self
                .orders
                .find(order_id)
                .await?
                .ok_or_else(|| PaymentError::not_found("Order not found"))?;
            return self.existing_redirect(&order, now).await;
        }

        info!(
            order_id,
            method = %method.id,
            reference = %created.reference,
            amount,
            "duitku transaction created"
        );

        let redirect = self
            .settings
            .checkout_redirect(method, order_id, created.payment_url.as_deref())
            .ok_or_else(|| PaymentError::MissingField {
                field: "paymentUrl".to_string(),
            })?;

        Ok(CheckoutRedirect {
            order_id,
            redirect,
            reused: false,
        })
    }

    async fn existing_redirect(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> PaymentResult<CheckoutRedirect> {
        let Some(payment) = &order.payment else {
            return Err(PaymentError::validation(
                "Order has no Duitku payment",
                Some("order_id"),
            ));
        };
        if order.status != PaymentStatus::Pending {
            return Err(PaymentError::validation(
                "Order is no longer awaiting payment",
                Some("order_id"),
            ));
        }
        if order.is_payment_overdue(now) {
            self.sweeper.sweep(order.order_id, now).await?;
            return Err(PaymentError::validation(
                "Payment period has expired",
                Some("order_id"),
            ));
        }

        let redirect = self
            .settings
            .method(&payment.method_id)
            .and_then(|m| self.settings.checkout_redirect(m, order.order_id, payment.payment_url.as_deref()))
            .unwrap_or_else(|| self.settings.storefront.payment_page_url(order.order_id));

        Ok(CheckoutRedirect {
            order_id: order.order_id,
            redirect,
            reused: true,
        })
    }

    fn build_inquiry(
        &self,
        order: &Order,
        method: &PaymentMethodDescriptor,
        merchant_order_id: &str,
        amount: i64,
        expiry_minutes: u32,
    ) -> InquiryRequest {
        let settings = &self.settings;
        let customer = &order.customer;

        InquiryRequest {
            merchant_code: settings.merchant_code.clone(),
            payment_amount: amount,
            payment_method: method.payment_code.clone(),
            merchant_order_id: merchant_order_id.to_string(),
            product_details: order.product_details(),
            customer_va_name: settings.customer_va_name.clone(),
            email: customer.email.clone(),
            phone_number: customer.phone.clone(),
            additional_param: String::new(),
            merchant_user_info: String::new(),
            customer_detail: CustomerDetail {
                first_name: customer.first_name.clone(),
                last_name: customer.last_name.clone(),
                email: customer.email.clone(),
                phone_number: customer.phone.clone(),
                billing_address: customer.billing.clone(),
                shipping_address: customer.shipping.clone(),
            },
            callback_url: settings.storefront.callback_url.clone(),
            return_url: settings.storefront.order_received_url(order.order_id),
            signature: outbound_signature(
                &settings.merchant_code,
                merchant_order_id,
                amount,
                &settings.api_key,
            ),
            expiry_period: expiry_minutes,
        }
    }
}
