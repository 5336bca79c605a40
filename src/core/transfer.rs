//! Transfers between bank accounts.
//!
//! A transfer is a DEBIT on the source and a CREDIT on the destination, applied in one
//! database transaction and linked by a shared `reference_id`. If either write fails
//! the transaction is dropped and neither balance moves.

use crate::{
    core::ledger::{self, NewEntry},
    entities::{enums::ReferenceType, transaction},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// A request to move money between two accounts.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    /// Account to debit
    pub from_account_id: i64,
    /// Account to credit
    pub to_account_id: i64,
    /// Positive amount to move
    pub amount: Decimal,
    /// Description recorded on both legs
    #[serde(default)]
    pub description: Option<String>,
}

/// Both legs of a completed transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    /// Shared `reference_id` of the two entries
    pub reference_id: String,
    /// Entry on the source account
    pub debit: transaction::Model,
    /// Entry on the destination account
    pub credit: transaction::Model,
}

/// Moves `amount` from one account to another as a single atomic unit.
///
/// # Errors
/// - [`Error::SameAccountTransfer`] when both ids are equal
/// - [`Error::InvalidAmount`] when `amount <= 0`
/// - [`Error::InactiveAccount`] when either account is inactive
/// - [`Error::InsufficientFunds`] when the source balance is below `amount`
pub async fn transfer(db: &DatabaseConnection, request: TransferRequest) -> Result<TransferReceipt> {
    let TransferRequest {
        from_account_id,
        to_account_id,
        amount,
        description,
    } = request;

    if from_account_id == to_account_id {
        return Err(Error::SameAccountTransfer);
    }
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    // Lock in id order so two opposite transfers cannot deadlock.
    let (first, second) = if from_account_id < to_account_id {
        (from_account_id, to_account_id)
    } else {
        (to_account_id, from_account_id)
    };
    let first = ledger::lock_account(&txn, first).await?;
    let second = ledger::lock_account(&txn, second).await?;
    let (from, to) = if first.id == from_account_id {
        (first, second)
    } else {
        (second, first)
    };

    for account in [&from, &to] {
        if !account.is_active {
            return Err(Error::InactiveAccount {
                account_id: account.id,
            });
        }
    }
    if from.balance < amount {
        return Err(Error::InsufficientFunds {
            current: from.balance,
            required: amount,
        });
    }

    let reference_id = format!("TRF-{}", Uuid::new_v4());
    let description = description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Transfer {} -> {}", from.name, to.name));

    let debit = ledger::apply_entry(
        &txn,
        from.id,
        NewEntry::debit(amount, description.clone())
            .with_reference(ReferenceType::Transfer, reference_id.clone()),
    )
    .await?;
    let credit = ledger::apply_entry(
        &txn,
        to.id,
        NewEntry::credit(amount, description)
            .with_reference(ReferenceType::Transfer, reference_id.clone()),
    )
    .await?;

    txn.commit().await?;

    info!(
        %reference_id,
        from_account_id,
        to_account_id,
        %amount,
        "Transfer completed"
    );

    Ok(TransferReceipt {
        reference_id,
        debit,
        credit,
    })
}
