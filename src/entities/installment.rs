//! Installment entity - A boleto, the deferred-payment instrument.
//!
//! Installments are created atomically with their order. The `amount` never changes;
//! `status` moves from `PENDING` to `OVERDUE` or `PAID`. While outstanding, an
//! installment holds its amount of the customer's credit.

use super::enums::InstallmentStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Installment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "installments")]
pub struct Model {
    /// Unique identifier for the installment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order that produced this installment
    pub order_id: i64,
    /// Customer who owes the amount
    pub customer_id: i64,
    /// Amount due
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    /// Date the amount falls due
    pub due_date: Date,
    /// Current status
    pub status: InstallmentStatus,
    /// Whether this is part of a multi-installment schedule
    pub is_installment: bool,
    /// 1-based position in the schedule
    pub installment_number: i32,
    /// Number of installments in the schedule
    pub total_installments: i32,
    /// Identifier assigned by the payment gateway
    pub gateway_id: Option<String>,
    /// Digitable line / barcode issued by the gateway
    pub payment_code: Option<String>,
    /// Link to the printable boleto or QR code
    pub payment_url: Option<String>,
    /// When the installment was paid
    pub paid_at: Option<DateTimeUtc>,
    /// When the installment was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Installment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each installment belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    /// Each installment is owed by one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
