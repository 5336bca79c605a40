//! Bank account, ledger entry and transfer endpoints.

use super::{ApiResult, AppState, body};
use crate::{
    core::{
        ledger::{self, BankAccountUpdate, NewBankAccount, NewEntry},
        transfer::{self, TransferReceipt, TransferRequest},
    },
    entities::{
        bank_account,
        enums::{ReferenceType, TransactionType},
        transaction,
    },
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Body of a manual ledger entry. `amount` is a positive magnitude; the type gives it
/// its sign.
#[derive(Debug, Deserialize)]
pub struct ManualEntryRequest {
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
}

/// POST /bank-accounts
pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<NewBankAccount>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<bank_account::Model>)> {
    let account = ledger::create_bank_account(&state.db, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// PATCH /bank-accounts/:id - The balance is not an accepted field.
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<BankAccountUpdate>, JsonRejection>,
) -> ApiResult<Json<bank_account::Model>> {
    let updated = ledger::update_bank_account(&state.db, id, body(payload)?).await?;
    Ok(Json(updated))
}

/// GET /bank-accounts/:id/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<transaction::Model>>> {
    Ok(Json(ledger::list_transactions(&state.db, id).await?))
}

/// POST /bank-accounts/:id/transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ManualEntryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<transaction::Model>)> {
    let request = body(payload)?;
    let mut entry = match request.transaction_type {
        TransactionType::Credit => NewEntry::credit(request.amount, request.description),
        TransactionType::Debit => NewEntry::debit(request.amount, request.description),
    };
    entry.reference_type = Some(ReferenceType::Manual);

    let created = ledger::apply_transaction(&state.db, id, entry).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /transactions/:id - Reverses the entry (both legs for a transfer) and returns
/// the removed entries.
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<transaction::Model>>> {
    let policy = state.config.ledger.reversal_policy;
    Ok(Json(ledger::reverse_transaction(&state.db, policy, id).await?))
}

/// POST /transfers
pub async fn create_transfer(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TransferReceipt>)> {
    let receipt = transfer::transfer(&state.db, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
