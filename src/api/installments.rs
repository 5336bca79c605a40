//! Installment lifecycle endpoints.

use super::{ApiResult, AppState};
use crate::{core::installment, entities::installment as installment_entity};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// POST /installments/:id/pay - Called by the gateway webhook once a boleto is paid.
pub async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<installment_entity::Model>> {
    Ok(Json(installment::mark_paid(&state.db, id).await?))
}

/// POST /installments/:id/payment-code
pub async fn regenerate_payment_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<installment_entity::Model>> {
    let updated =
        installment::regenerate_payment_code(&state.db, state.gateway.as_ref(), id).await?;
    Ok(Json(updated))
}

/// DELETE /installments/:id
pub async fn void_installment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    installment::void_installment(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
