//! Product entity - Catalog items that can be sold.
//!
//! Each product carries two price lists. Wholesale orders are priced from
//! `wholesale_price`, retail orders from `retail_price`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "Pão de queijo 1kg")
    pub name: String,
    /// Unit price used by wholesale orders
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub wholesale_price: Decimal,
    /// Unit price used by retail orders
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub retail_price: Decimal,
    /// Inactive products cannot be sold
    pub is_active: bool,
}

/// Products are referenced by order items only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
