//! Bank ledger business logic - Handles bank accounts and their transaction history.
//!
//! An account's `balance` is a cache of the sum of its entries. The only writes to it
//! happen here, in the same database transaction that inserts or deletes the entry that
//! moved it, so no entry is ever visible without its balance update or vice versa.
//!
//! Reversal subtracts the entry's amount from the *current* balance. Under the default
//! [`ReversalPolicy::Arithmetic`] the `balance_after` snapshots of later entries are
//! therefore informational; [`ReversalPolicy::LatestOnly`] restricts reversal to the
//! newest entry of the account so the snapshot chain stays reconstructible.

use crate::{
    config::ReversalPolicy,
    entities::{
        BankAccount, Transaction, bank_account,
        enums::{ReferenceType, TransactionType},
        transaction,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::{info, warn};

/// A ledger entry to apply to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    /// Signed amount: positive for credits, negative for debits
    pub amount: Decimal,
    /// Must agree with the sign of `amount`
    pub transaction_type: TransactionType,
    /// Human-readable description
    pub description: String,
    /// What produced the entry
    pub reference_type: Option<ReferenceType>,
    /// Identifier of the producing record
    pub reference_id: Option<String>,
}

impl NewEntry {
    /// A manual credit of `amount` (given as a positive magnitude).
    pub fn credit(amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            amount,
            transaction_type: TransactionType::Credit,
            description: description.into(),
            reference_type: None,
            reference_id: None,
        }
    }

    /// A manual debit of `amount` (given as a positive magnitude).
    pub fn debit(amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            amount: -amount,
            transaction_type: TransactionType::Debit,
            description: description.into(),
            reference_type: None,
            reference_id: None,
        }
    }

    /// Links the entry back to the record that produced it.
    #[must_use]
    pub fn with_reference(
        mut self,
        reference_type: ReferenceType,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = Some(reference_type);
        self.reference_id = Some(reference_id.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.amount.is_zero() {
            return Err(Error::InvalidAmount {
                amount: self.amount,
            });
        }
        let sign_matches = match self.transaction_type {
            TransactionType::Credit => self.amount.is_sign_positive(),
            TransactionType::Debit => self.amount.is_sign_negative(),
        };
        if !sign_matches {
            return Err(Error::validation(format!(
                "{:?} entries must have a {} amount, got {}",
                self.transaction_type,
                if self.transaction_type == TransactionType::Credit {
                    "positive"
                } else {
                    "negative"
                },
                self.amount
            )));
        }
        if self.description.trim().is_empty() {
            return Err(Error::validation("Transaction description cannot be empty"));
        }
        Ok(())
    }
}

/// Fields needed to open a bank account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBankAccount {
    /// Internal name
    pub name: String,
    /// Bank name
    #[serde(default)]
    pub bank_name: Option<String>,
    /// Branch number
    #[serde(default)]
    pub agency: Option<String>,
    /// Account number at the bank
    #[serde(default)]
    pub account_number: Option<String>,
    /// Recorded as an `OPENING_BALANCE` entry when non-zero
    #[serde(default)]
    pub opening_balance: Decimal,
}

/// Editable bank account fields. The balance is deliberately absent: it only moves
/// through ledger entries, and unknown fields are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BankAccountUpdate {
    pub name: Option<String>,
    pub bank_name: Option<String>,
    pub agency: Option<String>,
    pub account_number: Option<String>,
    pub is_active: Option<bool>,
}

/// Retrieves a bank account by ID.
pub async fn get_bank_account<C>(conn: &C, account_id: i64) -> Result<bank_account::Model>
where
    C: ConnectionTrait,
{
    BankAccount::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Bank account", account_id))
}

pub(crate) async fn lock_account<C>(conn: &C, account_id: i64) -> Result<bank_account::Model>
where
    C: ConnectionTrait,
{
    BankAccount::find_by_id(account_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Bank account", account_id))
}

/// Opens a bank account. A non-zero opening balance is booked as the first entry so
/// the balance equals the sum of entries from the start.
pub async fn create_bank_account(
    db: &DatabaseConnection,
    account: NewBankAccount,
) -> Result<bank_account::Model> {
    if account.name.trim().is_empty() {
        return Err(Error::validation("Bank account name cannot be empty"));
    }

    let txn = db.begin().await?;

    let created = bank_account::ActiveModel {
        name: Set(account.name.trim().to_string()),
        bank_name: Set(account.bank_name),
        agency: Set(account.agency),
        account_number: Set(account.account_number),
        balance: Set(Decimal::ZERO),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let opening = account.opening_balance;
    if !opening.is_zero() {
        let entry = if opening.is_sign_positive() {
            NewEntry::credit(opening, "Opening balance")
        } else {
            NewEntry::debit(-opening, "Opening balance")
        }
        .with_reference(ReferenceType::OpeningBalance, created.id.to_string());
        apply_entry(&txn, created.id, entry).await?;
    }

    let account = get_bank_account(&txn, created.id).await?;
    txn.commit().await?;

    info!(account_id = account.id, balance = %account.balance, "Bank account opened");
    Ok(account)
}

/// Updates descriptive fields and the active flag of a bank account.
pub async fn update_bank_account(
    db: &DatabaseConnection,
    account_id: i64,
    update: BankAccountUpdate,
) -> Result<bank_account::Model> {
    let account = get_bank_account(db, account_id).await?;
    let mut active: bank_account::ActiveModel = account.into();

    if let Some(name) = update.name {
        if name.trim().is_empty() {
            return Err(Error::validation("Bank account name cannot be empty"));
        }
        active.name = Set(name.trim().to_string());
    }
    if let Some(bank_name) = update.bank_name {
        active.bank_name = Set(Some(bank_name));
    }
    if let Some(agency) = update.agency {
        active.agency = Set(Some(agency));
    }
    if let Some(account_number) = update.account_number {
        active.account_number = Set(Some(account_number));
    }
    if let Some(is_active) = update.is_active {
        active.is_active = Set(is_active);
    }

    let updated = active.update(db).await?;
    info!(account_id, is_active = updated.is_active, "Bank account updated");
    Ok(updated)
}

/// Applies an entry inside the caller's transaction: locks the account, computes the
/// new balance, inserts the entry with its `balance_after` and stores the new balance.
pub(crate) async fn apply_entry<C>(
    conn: &C,
    account_id: i64,
    entry: NewEntry,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    entry.validate()?;

    let account = lock_account(conn, account_id).await?;
    if !account.is_active {
        return Err(Error::InactiveAccount { account_id });
    }

    let new_balance = account.balance + entry.amount;

    let created = transaction::ActiveModel {
        bank_account_id: Set(account_id),
        amount: Set(entry.amount),
        transaction_type: Set(entry.transaction_type),
        description: Set(entry.description),
        balance_after: Set(new_balance),
        reference_type: Set(entry.reference_type),
        reference_id: Set(entry.reference_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let mut active: bank_account::ActiveModel = account.into();
    active.balance = Set(new_balance);
    active.update(conn).await?;

    info!(
        account_id,
        transaction_id = created.id,
        amount = %created.amount,
        balance_after = %new_balance,
        "Ledger entry applied"
    );
    Ok(created)
}

/// Applies a single entry to an account as one atomic unit.
pub async fn apply_transaction(
    db: &DatabaseConnection,
    account_id: i64,
    entry: NewEntry,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;
    let created = apply_entry(&txn, account_id, entry).await?;
    txn.commit().await?;
    Ok(created)
}

/// Removes an entry inside the caller's transaction and takes its amount back out of
/// the account balance.
pub(crate) async fn reverse_entry<C>(
    conn: &C,
    entry: transaction::Model,
) -> Result<bank_account::Model>
where
    C: ConnectionTrait,
{
    let account = lock_account(conn, entry.bank_account_id).await?;
    let restored = account.balance - entry.amount;
    let transaction_id = entry.id;

    entry.delete(conn).await?;

    let mut active: bank_account::ActiveModel = account.into();
    active.balance = Set(restored);
    let updated = active.update(conn).await?;

    info!(
        account_id = updated.id,
        transaction_id,
        balance = %updated.balance,
        "Ledger entry reversed"
    );
    Ok(updated)
}

async fn latest_entry_id<C>(conn: &C, account_id: i64) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    Ok(Transaction::find()
        .filter(transaction::Column::BankAccountId.eq(account_id))
        .order_by_desc(transaction::Column::Id)
        .one(conn)
        .await?
        .map(|entry| entry.id))
}

/// Applies the reversal policy to a single entry. Under
/// [`ReversalPolicy::LatestOnly`] only the newest entry of its account may go.
pub(crate) async fn ensure_reversible<C>(
    conn: &C,
    policy: ReversalPolicy,
    entry: &transaction::Model,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if policy == ReversalPolicy::Arithmetic {
        return Ok(());
    }
    let latest = latest_entry_id(conn, entry.bank_account_id).await?;
    if latest == Some(entry.id) {
        return Ok(());
    }
    warn!(
        transaction_id = entry.id,
        account_id = entry.bank_account_id,
        "Refusing to reverse an entry that is not the newest on its account"
    );
    Err(Error::ReversalNotAllowed {
        transaction_id: entry.id,
        reason: "only the most recent entry of an account can be reversed".to_string(),
    })
}

/// Reverses a ledger entry and deletes it. Reversing either leg of a transfer reverses
/// both legs. Returns the reversed entries.
///
/// Opening-balance entries cannot be reversed, and entries booked for a payment are
/// reversed by deleting the payment instead.
pub async fn reverse_transaction(
    db: &DatabaseConnection,
    policy: ReversalPolicy,
    transaction_id: i64,
) -> Result<Vec<transaction::Model>> {
    let txn = db.begin().await?;

    let entry = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

    let entries = match (entry.reference_type, entry.reference_id.clone()) {
        (Some(ReferenceType::OpeningBalance), _) => {
            return Err(Error::ReversalNotAllowed {
                transaction_id,
                reason: "opening balance entries are permanent".to_string(),
            });
        }
        (Some(ReferenceType::Payment), _) => {
            return Err(Error::ReversalNotAllowed {
                transaction_id,
                reason: "entry belongs to a payment; delete the payment instead".to_string(),
            });
        }
        (Some(ReferenceType::Transfer), Some(reference_id)) => {
            Transaction::find()
                .filter(transaction::Column::ReferenceType.eq(ReferenceType::Transfer))
                .filter(transaction::Column::ReferenceId.eq(reference_id))
                .order_by_asc(transaction::Column::Id)
                .all(&txn)
                .await?
        }
        _ => vec![entry],
    };

    for leg in &entries {
        ensure_reversible(&txn, policy, leg).await?;
    }

    for leg in entries.iter().cloned() {
        reverse_entry(&txn, leg).await?;
    }

    txn.commit().await?;
    Ok(entries)
}

/// Retrieves an account's entries in the order they were applied.
pub async fn list_transactions<C>(conn: &C, account_id: i64) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    get_bank_account(conn, account_id).await?;
    Transaction::find()
        .filter(transaction::Column::BankAccountId.eq(account_id))
        .order_by_asc(transaction::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    async fn assert_balance_matches_entries(db: &DatabaseConnection, account_id: i64) -> Result<()> {
        let account = get_bank_account(db, account_id).await?;
        let sum: Decimal = list_transactions(db, account_id)
            .await?
            .iter()
            .map(|entry| entry.amount)
            .sum();
        assert_eq!(account.balance, sum);
        Ok(())
    }

    #[tokio::test]
    async fn test_opening_balance_is_booked_as_entry() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Caixa", dec!(500)).await?;

        assert_eq!(account.balance, dec!(500));
        let entries = list_transactions(&db, account.id).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reference_type, Some(ReferenceType::OpeningBalance));
        assert_eq!(entries[0].balance_after, dec!(500));

        Ok(())
    }

    #[tokio::test]
    async fn test_zero_opening_balance_has_no_entries() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Nubank", dec!(0)).await?;
        assert!(list_transactions(&db, account.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_debit_then_reverse_restores_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Itaú", dec!(500)).await?;

        let debit = apply_transaction(&db, account.id, NewEntry::debit(dec!(200), "Fornecedor"))
            .await?;
        assert_eq!(debit.amount, dec!(-200));
        assert_eq!(debit.balance_after, dec!(300));
        assert_eq!(get_bank_account(&db, account.id).await?.balance, dec!(300));

        let reversed = reverse_transaction(&db, ReversalPolicy::Arithmetic, debit.id).await?;
        assert_eq!(reversed.len(), 1);
        assert_eq!(get_bank_account(&db, account.id).await?.balance, dec!(500));
        assert!(Transaction::find_by_id(debit.id).one(&db).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_entries() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Itaú", dec!(100)).await?;

        let zero = apply_transaction(&db, account.id, NewEntry::credit(dec!(0), "nothing")).await;
        assert!(matches!(zero, Err(Error::InvalidAmount { .. })));

        let mismatched = NewEntry {
            amount: dec!(10),
            transaction_type: TransactionType::Debit,
            description: "wrong sign".to_string(),
            reference_type: None,
            reference_id: None,
        };
        let result = apply_transaction(&db, account.id, mismatched).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        assert_eq!(get_bank_account(&db, account.id).await?.balance, dec!(100));
        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_account_rejects_entries() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Antiga", dec!(100)).await?;
        update_bank_account(
            &db,
            account.id,
            BankAccountUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?;

        let result = apply_transaction(&db, account.id, NewEntry::credit(dec!(10), "Depósito")).await;
        assert!(matches!(result, Err(Error::InactiveAccount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_balance_equals_sum_after_mixed_operations() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Caixa", dec!(1000)).await?;

        let a = apply_transaction(&db, account.id, NewEntry::credit(dec!(250.75), "Venda")).await?;
        let b = apply_transaction(&db, account.id, NewEntry::debit(dec!(80.10), "Gás")).await?;
        apply_transaction(&db, account.id, NewEntry::debit(dec!(19.90), "Tarifa")).await?;
        assert_balance_matches_entries(&db, account.id).await?;

        reverse_transaction(&db, ReversalPolicy::Arithmetic, a.id).await?;
        assert_balance_matches_entries(&db, account.id).await?;
        reverse_transaction(&db, ReversalPolicy::Arithmetic, b.id).await?;
        assert_balance_matches_entries(&db, account.id).await?;

        assert_eq!(get_bank_account(&db, account.id).await?.balance, dec!(980.10));
        Ok(())
    }

    #[tokio::test]
    async fn test_latest_only_policy_refuses_older_entries() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Caixa", dec!(100)).await?;

        let first = apply_transaction(&db, account.id, NewEntry::credit(dec!(10), "A")).await?;
        let second = apply_transaction(&db, account.id, NewEntry::credit(dec!(20), "B")).await?;

        let refused = reverse_transaction(&db, ReversalPolicy::LatestOnly, first.id).await;
        assert!(matches!(refused, Err(Error::ReversalNotAllowed { .. })));
        assert_eq!(get_bank_account(&db, account.id).await?.balance, dec!(130));

        reverse_transaction(&db, ReversalPolicy::LatestOnly, second.id).await?;
        reverse_transaction(&db, ReversalPolicy::LatestOnly, first.id).await?;
        assert_eq!(get_bank_account(&db, account.id).await?.balance, dec!(100));
        Ok(())
    }

    #[tokio::test]
    async fn test_opening_balance_cannot_be_reversed() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Caixa", dec!(100)).await?;
        let opening = list_transactions(&db, account.id).await?.remove(0);

        let result = reverse_transaction(&db, ReversalPolicy::Arithmetic, opening.id).await;
        assert!(matches!(result, Err(Error::ReversalNotAllowed { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_reverse_missing_transaction() -> Result<()> {
        let db = setup_test_db().await?;
        let result = reverse_transaction(&db, ReversalPolicy::Arithmetic, 999).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_bank_account_keeps_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "Caixa", dec!(42)).await?;

        let updated = update_bank_account(
            &db,
            account.id,
            BankAccountUpdate {
                name: Some("Caixa loja".to_string()),
                bank_name: Some("Banco do Brasil".to_string()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(updated.name, "Caixa loja");
        assert_eq!(updated.bank_name.as_deref(), Some("Banco do Brasil"));
        assert_eq!(updated.balance, dec!(42));
        Ok(())
    }

    #[test]
    fn test_update_rejects_balance_field() {
        let parsed: std::result::Result<BankAccountUpdate, _> =
            serde_json::from_str(r#"{"name":"x","balance":"1000"}"#);
        assert!(parsed.is_err());
    }
}
