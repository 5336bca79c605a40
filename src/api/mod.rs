//! HTTP surface of the engine.

mod bank;
mod error;
mod installments;
mod orders;

pub use error::{ApiError, ApiResult, ErrorResponse};

use crate::{
    config::AppConfig,
    gateway::{Notifier, PaymentGateway},
};
use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    routing::{delete, get, patch, post},
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}

/// Unwraps a JSON body, turning a rejection into an error response.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    Ok(payload?.0)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Builds the router with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route(
            "/orders/:id/payments",
            get(orders::list_payments).post(orders::register_payment),
        )
        .route("/payments/:id", delete(orders::delete_payment))
        .route("/installments/:id", delete(installments::void_installment))
        .route("/installments/:id/pay", post(installments::mark_paid))
        .route(
            "/installments/:id/payment-code",
            post(installments::regenerate_payment_code),
        )
        .route("/bank-accounts", post(bank::create_account))
        .route("/bank-accounts/:id", patch(bank::update_account))
        .route(
            "/bank-accounts/:id/transactions",
            get(bank::list_transactions).post(bank::create_transaction),
        )
        .route("/transactions/:id", delete(bank::delete_transaction))
        .route("/transfers", post(bank::create_transfer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
