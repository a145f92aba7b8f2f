//! Configuration module for the trade pipeline
//!
//! This module handles configuration loading from TOML or JSON files and
//! environment variables, and provides structured configuration types.
//! Every field has a default so a partial file is always valid input.

use crate::confirm::ConfirmationLevel;
use crate::constants::{BPS_DENOMINATOR, DEFAULT_VANITY_TIMEOUT_SECS, JITO_MAINNET_ENDPOINTS};
use crate::rpc::{ConfigError, Network, RpcConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// RPC endpoint, retry and rate limit
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Private relay submission
    #[serde(default)]
    pub jito: JitoConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    /// Trade defaults
    #[serde(default)]
    pub trading: TradingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JitoConfig {
    /// Send through the relay instead of the RPC node
    #[serde(default)]
    pub enabled: bool,

    /// Block-engine base URLs, used round-robin
    #[serde(default = "default_jito_endpoints")]
    pub endpoints: Vec<String>,

    /// Optional authentication uuid
    #[serde(default)]
    pub uuid: Option<String>,

    /// Attempts per request on rate-limit style failures
    #[serde(default = "default_jito_retries")]
    pub max_retries: u32,

    #[serde(default = "default_jito_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// HTTP request timeout
    #[serde(default = "default_jito_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingConfig {
    /// Slippage tolerance (basis points)
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u64,

    #[serde(default = "default_true")]
    pub track_volume: bool,

    /// Tip appended to every trade, 0 disables
    #[serde(default)]
    pub jito_tip_lamports: u64,

    /// Depth `confirm` waits for: processed, confirmed or finalized
    #[serde(default = "default_confirmation")]
    pub confirmation: String,

    #[serde(default)]
    pub skip_preflight: bool,

    #[serde(default = "default_vanity_timeout_secs")]
    pub vanity_timeout_secs: u64,
}

// Default value functions
fn default_true() -> bool { true }
fn default_jito_endpoints() -> Vec<String> {
    JITO_MAINNET_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}
fn default_jito_retries() -> u32 { 3 }
fn default_jito_retry_delay_ms() -> u64 { 100 }
fn default_jito_timeout_ms() -> u64 { 10_000 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_slippage_bps() -> u64 { 200 }
fn default_confirmation() -> String { "confirmed".to_string() }
fn default_vanity_timeout_secs() -> u64 { DEFAULT_VANITY_TIMEOUT_SECS }

impl Default for JitoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoints: default_jito_endpoints(),
            uuid: None,
            max_retries: default_jito_retries(),
            retry_delay_ms: default_jito_retry_delay_ms(),
            timeout_ms: default_jito_timeout_ms(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            track_volume: true,
            jito_tip_lamports: 0,
            confirmation: default_confirmation(),
            skip_preflight: false,
            vanity_timeout_secs: default_vanity_timeout_secs(),
        }
    }
}

impl TradingConfig {
    pub fn confirmation_level(&self) -> Result<ConfirmationLevel, ConfigError> {
        self.confirmation.parse()
    }

    pub fn vanity_timeout(&self) -> Duration {
        Duration::from_secs(self.vanity_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = read(path.as_ref())?;
        let config: AppConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = read(path.as_ref())?;
        let config: AppConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Pick the loader by file extension (`.json`, anything else is TOML)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Defaults overridden by the process environment (after loading `.env`)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PUMP_*` / `JITO_*` variables from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PUMP_RPC_URL") {
            self.rpc.url = Some(url);
            self.rpc.network = Network::Custom;
        }
        if let Some(network) = lookup("PUMP_NETWORK") {
            self.rpc.network = network.parse()?;
        }
        if let Some(commitment) = lookup("PUMP_COMMITMENT") {
            self.rpc.commitment = commitment;
        }
        if let Some(timeout) = lookup("PUMP_TIMEOUT_MS") {
            self.rpc.timeout_ms = parse_env("PUMP_TIMEOUT_MS", &timeout)?;
        }
        if let Some(rps) = lookup("PUMP_RATE_LIMIT_RPS") {
            self.rpc.rate_limit.rps = parse_env("PUMP_RATE_LIMIT_RPS", &rps)?;
        }
        if let Some(path) = lookup("PUMP_KEYPAIR") {
            self.wallet.keypair_path = path;
        }
        if let Some(endpoints) = lookup("JITO_ENDPOINTS") {
            self.jito.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            self.jito.enabled = true;
        }
        if let Some(uuid) = lookup("JITO_UUID") {
            self.jito.uuid = Some(uuid);
        }
        debug!(network = ?self.rpc.network, jito = self.jito.enabled, "Applied environment overrides");
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rpc.validate()?;

        if self.jito.enabled && self.jito.endpoints.is_empty() {
            return Err(ConfigError::ValidationError(
                "jito.endpoints cannot be empty when jito is enabled".to_string(),
            ));
        }
        if self.trading.slippage_bps > BPS_DENOMINATOR {
            return Err(ConfigError::ValidationError(format!(
                "trading.slippage_bps must be <= {} (100%)",
                BPS_DENOMINATOR
            )));
        }
        self.trading.confirmation_level()?;
        Ok(())
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{} has invalid value '{}'", key, value)))
}
