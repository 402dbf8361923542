//! # Runtime Configuration
//!
//! Oracle settings plus the endpoints of the external collaborators.
//! Defaults are overridden by `ORACLE_*` environment variables.

use btc_oracle::{BitcoinNetwork, OracleConfig};
use thiserror::Error;
use tracing::info;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Oracle service settings.
    pub oracle: OracleConfig,
    /// bitcoind JSON-RPC endpoint.
    pub bitcoind_url: String,
    /// bitcoind RPC user.
    pub bitcoind_user: Option<String>,
    /// bitcoind RPC password.
    pub bitcoind_password: Option<String>,
    /// Esplora REST base URL for address history.
    pub esplora_url: String,
    /// Ledger wallet JSON-RPC endpoint. Unset runs against an in-memory
    /// ledger (dry run).
    pub ledger_url: Option<String>,
    /// Operator contact shown in alerts.
    pub operator: Option<String>,
    /// Read chat messages from stdin.
    pub console: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            bitcoind_url: "http://127.0.0.1:8332".to_string(),
            bitcoind_user: None,
            bitcoind_password: None,
            esplora_url: "https://blockstream.info/api".to_string(),
            ledger_url: None,
            operator: None,
            console: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("{name}={value:?} is invalid: {reason}")]
    InvalidValue {
        /// Variable name
        name: String,
        /// Raw value
        value: String,
        /// What was expected
        reason: &'static str,
    },
}

fn parse_number<T: std::str::FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value,
        reason: "expected a non-negative integer",
    })
}

fn parse_bool(name: &str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value,
            reason: "expected true or false",
        }),
    }
}

impl RuntimeConfig {
    /// Defaults overridden by whatever `lookup` returns for each
    /// `ORACLE_*` name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("ORACLE_NETWORK") {
            config.oracle.network =
                BitcoinNetwork::from_name(&value).ok_or(ConfigError::InvalidValue {
                    name: "ORACLE_NETWORK".to_string(),
                    value,
                    reason: "expected mainnet, testnet or regtest",
                })?;
        }
        if let Some(value) = lookup("ORACLE_MIN_CONFIRMATIONS") {
            config.oracle.min_confirmations = parse_number("ORACLE_MIN_CONFIRMATIONS", value)?;
        }
        if let Some(value) = lookup("ORACLE_POLL_INTERVAL_SECS") {
            config.oracle.poll_interval_secs = parse_number("ORACLE_POLL_INTERVAL_SECS", value)?;
        }
        if let Some(value) = lookup("ORACLE_RECONCILE_INTERVAL_SECS") {
            config.oracle.reconcile_interval_secs =
                parse_number("ORACLE_RECONCILE_INTERVAL_SECS", value)?;
        }
        if let Some(value) = lookup("ORACLE_RETRY_DELAY_MS") {
            config.oracle.retry_delay_ms = parse_number("ORACLE_RETRY_DELAY_MS", value)?;
        }
        if let Some(value) = lookup("ORACLE_PAIRING_SECRET") {
            config.oracle.pairing_secret = value;
        }

        if let Some(value) = lookup("ORACLE_BITCOIND_URL") {
            config.bitcoind_url = value;
        }
        config.bitcoind_user = lookup("ORACLE_BITCOIND_USER");
        config.bitcoind_password = lookup("ORACLE_BITCOIND_PASSWORD");
        if let Some(value) = lookup("ORACLE_ESPLORA_URL") {
            config.esplora_url = value;
        }
        config.ledger_url = lookup("ORACLE_LEDGER_URL").filter(|v| !v.is_empty());
        config.operator = lookup("ORACLE_OPERATOR");
        if let Some(value) = lookup("ORACLE_CONSOLE") {
            config.console = parse_bool("ORACLE_CONSOLE", value)?;
        }

        Ok(config)
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<RuntimeConfig, ConfigError> {
    let config = RuntimeConfig::from_lookup(|name| std::env::var(name).ok())?;
    info!(
        "[oracle] Network {:?}, {} confirmations, bitcoind {}",
        config.oracle.network, config.oracle.min_confirmations, config.bitcoind_url
    );
    Ok(config)
}
