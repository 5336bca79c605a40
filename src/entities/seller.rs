//! Seller entity - Sales staff who earn commission on the orders they place.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Seller database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sellers")]
pub struct Model {
    /// Unique identifier for the seller
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Seller name
    pub name: String,
    /// Commission as a fraction of the order total (0.05 = 5%)
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub commission_rate: Decimal,
    /// Highest discount percent this seller may grant, `None` for unrestricted
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub max_discount_percent: Option<Decimal>,
    /// Inactive sellers cannot place orders
    pub is_active: bool,
}

/// Defines relationships between Seller and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One seller has many commissions
    #[sea_orm(has_many = "super::commission::Entity")]
    Commissions,
}

impl Related<super::commission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
