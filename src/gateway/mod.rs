//! Outbound collaborators - the boleto payment gateway and the notification dispatcher.
//!
//! Both are called only after the settlement transaction has committed. A failure
//! here never undoes a financial record; callers log it and surface a warning.

mod http;
mod notifier;

pub use http::HttpGateway;
pub use notifier::{LogNotifier, Notifier, NotifyError};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Who pays a boleto.
#[derive(Debug, Clone, Serialize)]
pub struct Payer {
    /// Payer name as printed on the boleto
    pub name: String,
    /// CPF or CNPJ, digits only
    pub tax_id: String,
    /// Where the gateway e-mails the boleto
    pub email: Option<String>,
}

/// Data needed to register one boleto with the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct BoletoRequest {
    /// Our installment id, used by the gateway as the idempotency reference
    pub reference: String,
    /// Amount due
    pub amount: Decimal,
    /// Due date
    pub due_date: NaiveDate,
    /// Payer identity
    pub payer: Payer,
    /// Text printed on the boleto
    pub description: String,
}

/// What the gateway returns for an issued boleto.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IssuedBoleto {
    /// Gateway-side identifier
    pub gateway_id: String,
    /// Digitable line / barcode
    pub payment_code: String,
    /// Link to the printable boleto or QR code
    pub payment_url: Option<String>,
}

/// Issues deferred-payment codes for installments.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registers a boleto and returns its payment code.
    async fn issue_boleto(&self, request: &BoletoRequest) -> Result<IssuedBoleto, GatewayError>;
}

/// Gateway used when no boleto provider is configured; every call fails with
/// [`GatewayError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn issue_boleto(&self, _request: &BoletoRequest) -> Result<IssuedBoleto, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
