//! Application settings loaded from config.toml
//!
//! Every section and field has a default, so an empty or missing file yields a
//! working configuration. `DATABASE_URL` in the environment takes precedence over
//! `database.url` (see [`super::database::get_database_url`]).

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Settlement policy
    pub settlement: SettlementConfig,
    /// Bank ledger policy
    pub ledger: LedgerConfig,
    /// Payment gateway integration
    pub gateway: GatewayConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// How often PENDING installments past their due date are flagged OVERDUE
    pub overdue_sweep_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            overdue_sweep_secs: 3600,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL, overridden by `DATABASE_URL`
    pub url: Option<String>,
}

/// Settlement policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Customer types that may never pay with boleto
    pub boleto_blocked_customer_types: Vec<String>,
    /// Due-date offset used when a customer has no positive `payment_terms`
    pub default_payment_terms: i32,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            boleto_blocked_customer_types: vec!["walk_in".to_string()],
            default_payment_terms: 30,
        }
    }
}

/// How ledger entries may be reversed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalPolicy {
    /// Any entry may be reversed by subtracting its amount from the current balance.
    /// `balance_after` of later entries becomes informational.
    #[default]
    Arithmetic,
    /// Only the most recent entry of an account may be reversed.
    LatestOnly,
}

/// Bank ledger policy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Which entries `reverse_transaction` accepts
    pub reversal_policy: ReversalPolicy,
}

/// Payment gateway integration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the boleto API; the gateway is disabled when unset
    pub base_url: Option<String>,
    /// Bearer token for the boleto API
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout_secs: u64,
    /// Fine percentage printed on issued boletos
    pub late_fee_percent: Decimal,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 10,
            late_fee_percent: Decimal::TWO,
        }
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses settings from TOML text
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from `CONFIG_PATH` (default `./config.toml`), falling back to defaults
/// when the file does not exist.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        let config = load_config(&path)?;
        info!(path = %path, "Loaded configuration");
        Ok(config)
    } else {
        warn!(path = %path, "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}
