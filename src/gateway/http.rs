//! HTTP client for the boleto provider.

use super::{BoletoRequest, GatewayError, IssuedBoleto, PaymentGateway};
use crate::config::settings::GatewayConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Request body sent to the provider's `/boletos` endpoint.
#[derive(Debug, Serialize)]
struct CreateBoletoBody<'a> {
    external_reference: &'a str,
    amount: String,
    due_date: String,
    description: &'a str,
    payer: &'a super::Payer,
    late_fee_percent: String,
}

/// Boleto provider reached over HTTPS with a bearer token.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    late_fee_percent: String,
}

impl HttpGateway {
    /// Builds a client from settings; `None` when no base URL is configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Option<Self>, GatewayError> {
        let Some(base_url) = config.base_url.as_ref() else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            late_fee_percent: config.late_fee_percent.to_string(),
        }))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn issue_boleto(&self, request: &BoletoRequest) -> Result<IssuedBoleto, GatewayError> {
        let body = CreateBoletoBody {
            external_reference: &request.reference,
            amount: request.amount.to_string(),
            due_date: request.due_date.format("%Y-%m-%d").to_string(),
            description: &request.description,
            payer: &request.payer,
            late_fee_percent: self.late_fee_percent.clone(),
        };

        let mut builder = self
            .client
            .post(format!("{}/boletos", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(reference = %request.reference, "Issuing boleto");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(reference = %request.reference, status = status.as_u16(), "Boleto rejected");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<IssuedBoleto>().await?)
    }
}
