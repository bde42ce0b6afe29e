//! HTTP surface of the gateway.

pub mod callback;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod status;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::config::DuitkuSettings;
use crate::database::order_repository::OrderRepository;
use crate::health::HealthChecker;
use crate::payments::provider::PaymentGateway;
use crate::services::callback_handler::CallbackHandler;
use crate::services::expiry::ExpirySweeper;
use crate::services::payment_status::PaymentStatusService;
use crate::services::transaction::TransactionService;

/// Shared handler state. Every service reads the same settings snapshot.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<DuitkuSettings>,
    pub orders: Arc<dyn OrderRepository>,
    pub transactions: Arc<TransactionService>,
    pub callbacks: Arc<CallbackHandler>,
    pub status: Arc<PaymentStatusService>,
    pub sweeper: Arc<ExpirySweeper>,
    pub health_checker: Arc<HealthChecker>,
}

impl AppState {
    pub fn new(
        settings: Arc<DuitkuSettings>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderRepository>,
        health_checker: HealthChecker,
    ) -> Self {
        let sweeper = Arc::new(ExpirySweeper::new(orders.clone()));
        Self {
            transactions: Arc::new(TransactionService::new(
                settings.clone(),
                gateway,
                orders.clone(),
            )),
            callbacks: Arc::new(CallbackHandler::new(settings.clone(), orders.clone())),
            status: Arc::new(PaymentStatusService::new(
                settings.clone(),
                orders.clone(),
                sweeper.clone(),
            )),
            sweeper,
            settings,
            orders,
            health_checker: Arc::new(health_checker),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/duitku/callback", post(callback::handle_callback))
        .route("/api/payments/status", post(status::check_status))
        .route("/api/checkout", post(checkout::process_payment))
        .route("/api/orders", post(orders::register_order))
        .route("/api/orders/{id}/cancelled", post(orders::order_cancelled))
        .route("/api/orders/{id}/payment", get(orders::payment_details))
        .with_state(state)
}
