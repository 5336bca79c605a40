//! Unified error type for the settlement and ledger engine.
//!
//! Every operation returns [`Result`]. Variants are grouped by [`ErrorKind`] so the
//! HTTP layer can map them to status codes without matching on each variant.

use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons the eligibility guard blocks a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EligibilityError {
    #[error("Customer type '{customer_type}' cannot pay with boleto")]
    PaymentMethodNotAllowed { customer_type: String },

    #[error("Boleto requires a valid CPF or CNPJ, got {tax_id:?}")]
    InvalidTaxId { tax_id: Option<String> },

    #[error("Customer has {count} overdue boleto(s) totalling {total}")]
    OverdueInstallments { count: usize, total: Decimal },

    #[error("Insufficient credit: requested {requested}, available {available} (short by {shortfall})")]
    InsufficientCredit {
        requested: Decimal,
        available: Decimal,
        shortfall: Decimal,
    },

    #[error("Discount of {requested}% exceeds the seller's maximum of {max}%")]
    DiscountTooHigh { requested: Decimal, max: Decimal },

    #[error("Payment method {method} requires a customer")]
    CustomerRequired { method: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Not eligible: {0}")]
    Eligibility(#[from] EligibilityError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Payment of {amount} exceeds remaining balance of {remaining}")]
    PaymentExceedsRemaining { amount: Decimal, remaining: Decimal },

    #[error("Insufficient funds: current balance {current}, required {required}")]
    InsufficientFunds { current: Decimal, required: Decimal },

    #[error("Bank account {account_id} is inactive")]
    InactiveAccount { account_id: i64 },

    #[error("Cannot transfer from an account to itself")]
    SameAccountTransfer,

    #[error("Transaction {transaction_id} cannot be reversed: {reason}")]
    ReversalNotAllowed { transaction_id: i64, reason: String },

    #[error("Order {order_id} cannot be changed: {reason}")]
    InvalidOrderState { order_id: i64, reason: String },

    #[error(transparent)]
    Gateway(#[from] crate::gateway::GatewayError),
}

/// Broad failure classes, mirrored by HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any write
    Validation,
    /// Credit or payment-method policy, rejected before any write
    Eligibility,
    /// Request conflicts with current balances or state
    Consistency,
    /// Referenced record does not exist
    NotFound,
    /// The store failed; the surrounding transaction was rolled back
    Store,
    /// The payment gateway failed
    Upstream,
    /// Startup or environment problem
    Internal,
}

impl Error {
    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidAmount { .. } => ErrorKind::Validation,
            Self::Eligibility(_) => ErrorKind::Eligibility,
            Self::PaymentExceedsRemaining { .. }
            | Self::InsufficientFunds { .. }
            | Self::InactiveAccount { .. }
            | Self::SameAccountTransfer
            | Self::ReversalNotAllowed { .. }
            | Self::InvalidOrderState { .. } => ErrorKind::Consistency,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Database(_) => ErrorKind::Store,
            Self::Gateway(_) => ErrorKind::Upstream,
            Self::Config { .. } | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
