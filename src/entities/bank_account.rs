//! Bank account entity - An account whose balance is the sum of its ledger entries.
//!
//! `balance` is a cache maintained exclusively by `core::ledger`; no other code path
//! writes it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Internal name (e.g. "Caixa loja", "Itaú PJ")
    pub name: String,
    /// Bank name
    pub bank_name: Option<String>,
    /// Branch number
    pub agency: Option<String>,
    /// Account number at the bank
    pub account_number: Option<String>,
    /// Running sum of all ledger entries
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub balance: Decimal,
    /// Inactive accounts accept no new entries
    pub is_active: bool,
    /// When the account was opened
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `BankAccount` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account has many ledger entries
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
