//! Enumerated column values shared across entities.
//!
//! Every enum is persisted as its upper-case string value so the tables stay
//! readable from plain SQL.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How (part of) an order is paid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash on delivery
    #[sea_orm(string_value = "CASH")]
    Cash,
    /// Instant transfer
    #[sea_orm(string_value = "PIX")]
    Pix,
    /// Credit card
    #[sea_orm(string_value = "CREDIT_CARD")]
    CreditCard,
    /// Debit card
    #[sea_orm(string_value = "DEBIT_CARD")]
    DebitCard,
    /// Deferred-payment instrument, split into installments
    #[sea_orm(string_value = "BOLETO")]
    Boleto,
    /// Bought on the customer's account, settled later through payments
    #[sea_orm(string_value = "STORE_CREDIT")]
    StoreCredit,
}

impl PaymentMethod {
    /// Whether this method produces a deferred instrument (boleto).
    #[must_use]
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::Boleto)
    }

    /// Whether paying with this method draws on the customer's available credit.
    #[must_use]
    pub const fn consumes_credit(self) -> bool {
        matches!(self, Self::Boleto | Self::StoreCredit)
    }
}

/// Price list an order is priced from
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Priced from `wholesale_price`
    #[sea_orm(string_value = "WHOLESALE")]
    Wholesale,
    /// Priced from `retail_price`
    #[sea_orm(string_value = "RETAIL")]
    Retail,
}

/// Lifecycle of an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Settled and active
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    /// Cancelled; its financial artifacts have been unwound
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// Lifecycle of a boleto installment
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    /// Issued and not yet due
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Settled by the payer
    #[sea_orm(string_value = "PAID")]
    Paid,
    /// Past its due date without payment
    #[sea_orm(string_value = "OVERDUE")]
    Overdue,
}

impl InstallmentStatus {
    /// Whether the installment still holds customer credit.
    #[must_use]
    pub const fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Overdue)
    }
}

/// Lifecycle of a sales commission
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    /// Awaiting payout
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Paid out to the seller
    #[sea_orm(string_value = "PAID")]
    Paid,
    /// Voided because the order was cancelled
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// Direction of a ledger entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money in; amount is positive
    #[sea_orm(string_value = "CREDIT")]
    Credit,
    /// Money out; amount is negative
    #[sea_orm(string_value = "DEBIT")]
    Debit,
}

/// What a ledger entry points back to
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// An order
    #[sea_orm(string_value = "ORDER")]
    Order,
    /// A payment registered against an order
    #[sea_orm(string_value = "PAYMENT")]
    Payment,
    /// One leg of a transfer between accounts
    #[sea_orm(string_value = "TRANSFER")]
    Transfer,
    /// The balance an account was opened with
    #[sea_orm(string_value = "OPENING_BALANCE")]
    OpeningBalance,
    /// A manual bookkeeping entry
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}
