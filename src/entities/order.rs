//! Order entity - A settled sale.
//!
//! An order is created once, together with its items, commission and installments,
//! and its `total` never changes afterwards. Payment state is not stored here;
//! it is derived from the `payments` table on read.

use super::enums::{OrderStatus, OrderType, PaymentMethod};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-facing number, `YYYYMMDD-NNNNN`
    #[sea_orm(unique)]
    pub order_number: String,
    /// Buying customer; `None` for own (self-placed) orders
    pub customer_id: Option<i64>,
    /// Seller credited with the sale
    pub seller_id: Option<i64>,
    /// Price list used for the items
    pub order_type: OrderType,
    /// Whether the order was placed for the company itself
    pub is_own_order: bool,
    /// Sum of non-gift line totals
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub subtotal: Decimal,
    /// Discount percent applied to the subtotal
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_percent: Decimal,
    /// Discount amount, `subtotal * discount_percent / 100`
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount: Decimal,
    /// Delivery fee added on top of the discounted subtotal
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub delivery_fee: Decimal,
    /// `subtotal - discount + delivery_fee`
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total: Decimal,
    /// Primary payment method
    pub payment_method: PaymentMethod,
    /// Optional second payment method for split payments
    pub secondary_payment_method: Option<PaymentMethod>,
    /// Portion of the total paid with the primary method
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub primary_amount: Decimal,
    /// Portion of the total paid with the secondary method
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub secondary_amount: Option<Decimal>,
    /// Installment schedule requested for the boleto portion (e.g. `"3x-10-20-30"`)
    pub installment_spec: Option<String>,
    /// Order lifecycle status
    pub status: OrderStatus,
    /// Requested delivery date
    pub delivery_date: Option<Date>,
    /// Delivery address
    pub delivery_address: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Caller-supplied key that makes settlement retries safe
    #[sea_orm(unique, nullable)]
    pub idempotency_key: Option<String>,
    /// When the order was settled
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Amount charged to `method` across both payment slots.
    #[must_use]
    pub fn amount_for(&self, method: PaymentMethod) -> Decimal {
        let mut amount = Decimal::ZERO;
        if self.payment_method == method {
            amount += self.primary_amount;
        }
        if self.secondary_payment_method == Some(method) {
            amount += self.secondary_amount.unwrap_or_default();
        }
        amount
    }
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order may belong to one customer
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    /// One order has many items
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    /// One order has many installments
    #[sea_orm(has_many = "super::installment::Entity")]
    Installments,
    /// One order has many payments
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::installment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Installments.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
