//! Private relay client (block-engine JSON-RPC)
//!
//! An alternate send path. Endpoints are used round-robin and a request is
//! retried on the next endpoint only for rate-limit style failures. A sent
//! bundle can be followed to landing with [`JitoClient::wait_for_bundle`].

use crate::config::JitoConfig;
use crate::constants::JITO_TIP_ACCOUNTS;
use crate::rpc::errors::is_rate_limit_message;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use nonempty::NonEmpty;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::Transaction};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Bundle status poll period
pub const BUNDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug, Clone)]
pub enum RelayError {
    #[error("relay request to {endpoint} failed: {message}")]
    Http { endpoint: String, message: String },

    #[error("relay {endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("relay {endpoint} error {code}: {message}")]
    Rpc {
        endpoint: String,
        code: i64,
        message: String,
    },

    #[error("invalid relay response: {0}")]
    InvalidResponse(String),

    #[error("bundle requires at least one transaction")]
    EmptyBundle,

    #[error("transaction encoding failed: {0}")]
    Encode(String),

    #[error("{operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<RelayError>,
    },

    #[error("bundle {bundle_id} failed: {err}")]
    BundleFailed { bundle_id: String, err: String },

    #[error("relay request cancelled")]
    Cancelled,

    #[error("relay configuration error: {0}")]
    Configuration(String),
}

impl RelayError {
    /// Rate-limit style failures are worth another endpoint
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Http { .. } | RelayError::Status { .. } | RelayError::Rpc { .. } => {
                is_rate_limit_message(&self.to_string())
            }
            _ => false,
        }
    }
}

/// Outcome of submitting one transaction as a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub signature: Signature,
    pub bundle_id: String,
}

/// One entry of `getBundleStatuses`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BundleStatus {
    pub bundle_id: String,
    #[serde(default)]
    pub transactions: Vec<String>,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub confirmation_status: Option<String>,
    /// `{"Ok": null}` on success
    #[serde(default)]
    pub err: Value,
}

impl BundleStatus {
    pub fn is_landed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }

    pub fn is_failed(&self) -> bool {
        !self.err.is_null() && self.err.get("Ok").is_none()
    }
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct StatusesEnvelope {
    #[serde(default)]
    value: Vec<Option<BundleStatus>>,
}

/// Pick one of the mainnet tip accounts at random
pub fn random_tip_account() -> Pubkey {
    JITO_TIP_ACCOUNTS[fastrand::usize(..JITO_TIP_ACCOUNTS.len())]
}

/// Block-engine client
#[derive(Debug)]
pub struct JitoClient {
    http: Client,
    endpoints: NonEmpty<String>,
    uuid: Option<String>,
    next_endpoint: AtomicUsize,
    next_id: AtomicU64,
    max_retries: u32,
    retry_delay: Duration,
}

impl JitoClient {
    pub fn new(config: &JitoConfig) -> Result<Self, RelayError> {
        let endpoints = NonEmpty::from_vec(
            config
                .endpoints
                .iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
        )
        .ok_or_else(|| RelayError::Configuration("no relay endpoints configured".to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RelayError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            endpoints,
            uuid: config.uuid.clone(),
            next_endpoint: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn endpoints(&self) -> &NonEmpty<String> {
        &self.endpoints
    }

    fn endpoint(&self) -> &str {
        let idx = self.next_endpoint.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        self.endpoints
            .get(idx)
            .unwrap_or_else(|| self.endpoints.first())
    }

    /// One JSON-RPC call against one endpoint
    async fn post(&self, endpoint: &str, method: &str, params: &Value) -> Result<Value, RelayError> {
        let url = format!("{}/bundles", endpoint);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let mut req = self.http.post(&url).json(&payload);
        if let Some(uuid) = &self.uuid {
            req = req.header("x-jito-auth", uuid);
        }

        let resp = req.send().await.map_err(|e| RelayError::Http {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;
        if let Some(err) = parsed.error {
            return Err(RelayError::Rpc {
                endpoint: endpoint.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| RelayError::InvalidResponse(format!("{} returned no result", method)))
    }

    /// Rotate endpoints until success, a non-retryable error or exhaustion
    async fn call(
        &self,
        cancel: &CancellationToken,
        method: &str,
        params: Value,
    ) -> Result<Value, RelayError> {
        let mut last = None;
        for attempt in 1..=self.max_retries {
            if cancel.is_cancelled() {
                return Err(RelayError::Cancelled);
            }
            let endpoint = self.endpoint();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                result = self.post(endpoint, method, &params) => result,
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    debug!(method, attempt, endpoint, error = %err, "Relay rate limited, rotating");
                    last = Some(err);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }

        let source = last.unwrap_or_else(|| RelayError::InvalidResponse("no attempt made".into()));
        warn!(method, attempts = self.max_retries, error = %source, "Relay retries exhausted");
        Err(RelayError::Exhausted {
            operation: method.to_string(),
            attempts: self.max_retries,
            source: Box::new(source),
        })
    }

    /// Submit a signed transaction as a single-transaction bundle
    #[instrument(skip_all)]
    pub async fn send_transaction(
        &self,
        cancel: &CancellationToken,
        transaction: &Transaction,
    ) -> Result<SendResult, RelayError> {
        let bundle_id = self
            .send_bundle(cancel, std::slice::from_ref(transaction))
            .await?;
        Ok(SendResult {
            signature: transaction.signatures.first().copied().unwrap_or_default(),
            bundle_id,
        })
    }

    /// Submit signed transactions atomically; returns the bundle id
    #[instrument(skip_all, fields(transactions = transactions.len()))]
    pub async fn send_bundle(
        &self,
        cancel: &CancellationToken,
        transactions: &[Transaction],
    ) -> Result<String, RelayError> {
        if transactions.is_empty() {
            return Err(RelayError::EmptyBundle);
        }
        let encoded = transactions
            .iter()
            .map(encode_transaction)
            .collect::<Result<Vec<_>, _>>()?;

        let result = self
            .call(cancel, "sendBundle", json!([encoded, {"encoding": "base64"}]))
            .await?;
        let bundle_id = result
            .as_str()
            .map(String::from)
            .ok_or_else(|| RelayError::InvalidResponse(format!("bundle id not a string: {}", result)))?;
        debug!(%bundle_id, "Bundle accepted");
        Ok(bundle_id)
    }

    /// Statuses in request order; `None` for unknown bundles
    pub async fn get_bundle_statuses(
        &self,
        cancel: &CancellationToken,
        bundle_ids: &[String],
    ) -> Result<Vec<Option<BundleStatus>>, RelayError> {
        let result = self
            .call(cancel, "getBundleStatuses", json!([bundle_ids]))
            .await?;
        if result.is_null() {
            return Ok(vec![None; bundle_ids.len()]);
        }
        parse_statuses(result)
    }

    /// Tip accounts advertised by the block engine; unparsable entries are skipped
    pub async fn get_tip_accounts(&self, cancel: &CancellationToken) -> Result<Vec<Pubkey>, RelayError> {
        let result = self.call(cancel, "getTipAccounts", json!([])).await?;
        let accounts: Vec<String> = serde_json::from_value(result)
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;
        Ok(accounts
            .iter()
            .filter_map(|a| Pubkey::from_str(a).ok())
            .collect())
    }

    pub fn random_tip_account(&self) -> Pubkey {
        random_tip_account()
    }

    /// Poll the bundle every [`BUNDLE_POLL_INTERVAL`] until it lands or fails
    ///
    /// Each poll is a single request; failed or empty polls wait for the next tick.
    pub async fn wait_for_bundle(
        &self,
        cancel: &CancellationToken,
        bundle_id: &str,
    ) -> Result<BundleStatus, RelayError> {
        self.poll_bundle(cancel, bundle_id, BUNDLE_POLL_INTERVAL).await
    }

    #[instrument(skip(self, cancel))]
    async fn poll_bundle(
        &self,
        cancel: &CancellationToken,
        bundle_id: &str,
        period: Duration,
    ) -> Result<BundleStatus, RelayError> {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let params = json!([[bundle_id]]);
        let mut polls: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                _ = ticker.tick() => {}
            }
            polls += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                result = self.post(self.endpoint(), "getBundleStatuses", &params) => result,
            };
            let status = match result.and_then(parse_statuses) {
                Ok(statuses) => statuses.into_iter().next().flatten(),
                Err(e) => {
                    debug!(error = %e, polls, "Bundle status query failed, skipping tick");
                    continue;
                }
            };
            let Some(status) = status else {
                continue;
            };

            if status.is_failed() {
                warn!(slot = status.slot, err = %status.err, "Bundle failed");
                return Err(RelayError::BundleFailed {
                    bundle_id: bundle_id.to_string(),
                    err: status.err.to_string(),
                });
            }
            if status.is_landed() {
                info!(slot = status.slot, polls, "Bundle landed");
                return Ok(status);
            }
        }
    }
}

fn parse_statuses(result: Value) -> Result<Vec<Option<BundleStatus>>, RelayError> {
    if result.is_null() {
        return Ok(Vec::new());
    }
    let envelope: StatusesEnvelope =
        serde_json::from_value(result).map_err(|e| RelayError::InvalidResponse(e.to_string()))?;
    Ok(envelope.value)
}

/// Wire form of a transaction: base64 of the bincode encoding
pub fn encode_transaction(transaction: &Transaction) -> Result<String, RelayError> {
    let bytes = bincode::serialize(transaction).map_err(|e| RelayError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(bytes))
}
