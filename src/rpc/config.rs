use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use std::time::Duration;

/// Cluster selector used to pick a default RPC URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
    /// Requires an explicit `url`
    Custom,
}

impl Network {
    /// Default public endpoint for the cluster
    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => Some("https://api.mainnet-beta.solana.com"),
            Network::Testnet => Some("https://api.testnet.solana.com"),
            Network::Devnet => Some("https://api.devnet.solana.com"),
            Network::Custom => None,
        }
    }
}

impl std::str::FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "custom" => Ok(Network::Custom),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown network: {}",
                other
            ))),
        }
    }
}

/// Retry behaviour of the resilient client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles per attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff (0 = uncapped)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Randomly shave up to half off each backoff
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    150
}

fn default_max_backoff_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Number of attempts the retry loop will make
    pub fn effective_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

/// Token bucket settings for the shared limiter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Requests per second; `<= 0` disables limiting
    #[serde(default = "default_rps")]
    pub rps: f64,

    /// Bucket size; 0 means twice the rate
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_rps() -> f64 {
    8.0
}

fn default_burst() -> u32 {
    16
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rps: default_rps(),
            burst: default_burst(),
        }
    }
}

impl RateLimitConfig {
    pub fn is_enabled(&self) -> bool {
        self.rps > 0.0 && self.rps.is_finite()
    }

    /// Burst actually handed to the limiter
    pub fn effective_burst(&self) -> u32 {
        if self.burst > 0 {
            self.burst
        } else {
            ((self.rps * 2.0).ceil() as u32).max(1)
        }
    }
}

/// Connection settings for the resilient client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    #[serde(default)]
    pub network: Network,

    /// Explicit endpoint; overrides the network default
    #[serde(default)]
    pub url: Option<String>,

    /// processed | confirmed | finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Per-call deadline covering every retry of one logical call (0 = none)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_commitment() -> String {
    "finalized".to_string()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            url: None,
            commitment: default_commitment(),
            timeout_ms: default_timeout_ms(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl RpcConfig {
    /// Configuration pointing at a single URL with default policies
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            network: Network::Custom,
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Endpoint the transport should dial
    pub fn resolve_url(&self) -> Result<String, ConfigError> {
        match (&self.url, self.network.default_url()) {
            (Some(url), _) if !url.trim().is_empty() => Ok(url.trim().to_string()),
            (_, Some(default)) => Ok(default.to_string()),
            _ => Err(ConfigError::ValidationError(
                "Custom network requires an RPC url".to_string(),
            )),
        }
    }

    pub fn commitment_config(&self) -> Result<CommitmentConfig, ConfigError> {
        let commitment = match self.commitment.trim().to_lowercase().as_str() {
            "processed" => CommitmentLevel::Processed,
            "confirmed" => CommitmentLevel::Confirmed,
            "finalized" => CommitmentLevel::Finalized,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid commitment: {}",
                    other
                )))
            }
        };
        Ok(CommitmentConfig { commitment })
    }

    /// Deadline for one logical call, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.resolve_url()?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid URL format: {}",
                url
            )));
        }

        self.commitment_config()?;

        if self.retry.enabled && self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "Retry max_attempts must be > 0 when retries are enabled".to_string(),
            ));
        }

        if self.retry.max_backoff_ms > 0 && self.retry.max_backoff_ms < self.retry.initial_backoff_ms
        {
            return Err(ConfigError::ValidationError(
                "Retry max_backoff_ms must be >= initial_backoff_ms".to_string(),
            ));
        }

        if self.rate_limit.rps.is_nan() {
            return Err(ConfigError::ValidationError(
                "Rate limit rps must be a number".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration-related errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    ValidationError(String),
    MissingEnvVar(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ConfigError::MissingEnvVar(var) => write!(f, "Missing environment variable: {}", var),
        }
    }
}

impl std::error::Error for ConfigError {}
