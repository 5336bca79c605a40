//! Customer entity - Buyers known to the customer directory.
//!
//! Carries the credit fields the settlement engine consumes: `credit_limit`,
//! `available_credit` and the default `payment_terms` used for installment due dates.
//! `available_credit` is only ever adjusted incrementally by `core::credit`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    /// Unique identifier for the customer
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (trade name for companies)
    pub name: String,
    /// CPF (11 digits) or CNPJ (14 digits), possibly formatted with punctuation
    pub tax_id: Option<String>,
    /// Contact e-mail used for notifications
    pub email: Option<String>,
    /// Contact phone used for notifications
    pub phone: Option<String>,
    /// Free-form classification (e.g. `"wholesale"`, `"walk_in"`); some types may not buy on boleto
    pub customer_type: String,
    /// Maximum credit the customer may have outstanding
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub credit_limit: Decimal,
    /// Credit still available: `credit_limit` minus outstanding obligations
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub available_credit: Decimal,
    /// Default number of days until a boleto falls due
    pub payment_terms: i32,
    /// When the customer was registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Customer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One customer has many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    /// One customer has many installments
    #[sea_orm(has_many = "super::installment::Entity")]
    Installments,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::installment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Installments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
