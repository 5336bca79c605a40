//! Transaction entity - One signed entry in a bank account's ledger.
//!
//! Each entry has a `bank_account_id`, a signed `amount` (positive for `CREDIT`,
//! negative for `DEBIT`), and the `balance_after` snapshot taken when it was applied.
//! `reference_type`/`reference_id` link the entry back to the payment or transfer
//! that produced it.
use super::enums::{ReferenceType, TransactionType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the bank account this entry belongs to
    pub bank_account_id: i64,
    /// Signed amount (positive for credits, negative for debits)
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    /// Credit or debit
    pub transaction_type: TransactionType,
    /// Human-readable description of the entry
    pub description: String,
    /// Account balance immediately after this entry was applied
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub balance_after: Decimal,
    /// Kind of record this entry points back to
    pub reference_type: Option<ReferenceType>,
    /// Identifier of the referenced record (transfer ids are shared by both legs)
    pub reference_id: Option<String>,
    /// When the entry was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one bank account
    #[sea_orm(
        belongs_to = "super::bank_account::Entity",
        from = "Column::BankAccountId",
        to = "super::bank_account::Column::Id"
    )]
    BankAccount,
}

impl Related<super::bank_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
