//! Order, settlement and payment endpoints.

use super::{ApiResult, AppState, body};
use crate::{
    core::{
        payment::{self, NewPayment, PaymentReceipt, PaymentSummary},
        settlement::{self, OrderDetails, SettlementContext, SettlementOutcome, SettlementRequest},
    },
    entities::{order, payment as payment_entity},
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

/// POST /orders - Settle a cart.
///
/// Replays of an idempotency key answer 200 with the original order.
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<SettlementRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SettlementOutcome>)> {
    let request = body(payload)?;
    let ctx = SettlementContext {
        db: &state.db,
        config: &state.config.settlement,
        gateway: state.gateway.as_ref(),
        notifier: Arc::clone(&state.notifier),
    };
    let outcome = settlement::create_order(&ctx, request).await?;
    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

/// GET /orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderDetails>> {
    Ok(Json(settlement::get_order(&state.db, id).await?))
}

/// POST /orders/:id/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<order::Model>> {
    Ok(Json(settlement::cancel_order(&state.db, id).await?))
}

/// Payments of an order with its derived figures.
#[derive(Debug, Serialize)]
pub struct PaymentList {
    #[serde(flatten)]
    pub summary: PaymentSummary,
    pub payments: Vec<payment_entity::Model>,
}

/// GET /orders/:id/payments
pub async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PaymentList>> {
    let (summary, payments) = payment::get_payment_summary(&state.db, id).await?;
    Ok(Json(PaymentList { summary, payments }))
}

/// POST /orders/:id/payments
pub async fn register_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<NewPayment>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PaymentReceipt>)> {
    let new_payment = body(payload)?;
    let receipt = payment::register_payment(&state.db, id, new_payment).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// DELETE /payments/:id - Returns the order's recomputed figures. A bank deposit is
/// reversed under the configured reversal policy.
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PaymentSummary>> {
    let policy = state.config.ledger.reversal_policy;
    Ok(Json(payment::delete_payment(&state.db, policy, id).await?))
}
