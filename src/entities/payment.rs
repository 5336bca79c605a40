//! Payment entity - A partial settlement registered against an order.
//!
//! The order's paid amount and payment status are always derived from the full
//! set of its payments.

use super::enums::PaymentMethod;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order being paid
    pub order_id: i64,
    /// Amount received
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    /// How the money was received
    pub payment_method: PaymentMethod,
    /// Date the money was received
    pub payment_date: Date,
    /// Free-form notes
    pub notes: Option<String>,
    /// Account the money was deposited into, if any
    pub bank_account_id: Option<i64>,
    /// Ledger entry created for the deposit, if any
    pub ledger_transaction_id: Option<i64>,
    /// When the payment was registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
