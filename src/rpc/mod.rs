//! Remote procedure layer
//!
//! [`RpcTransport`] is the single-shot wire seam: one request, one answer, no
//! retries. [`ResilientClient`] wraps any transport with the shared rate
//! limiter, the per-call deadline and the retry loop, and is the only way the
//! rest of the pipeline talks to a node.

pub mod client;
pub mod config;
pub mod errors;
pub mod retry;
pub mod solana;

pub use client::ResilientClient;
pub use config::{ConfigError, Network, RateLimitConfig, RetryConfig, RpcConfig};
pub use errors::{RpcError, RpcResult};
pub use retry::retry_with_backoff;
pub use solana::SolanaTransport;

use crate::confirm::ConfirmationLevel;
use async_trait::async_trait;
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::{Transaction, TransactionError},
};

/// Result of a non-committing execution
#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    /// Structured execution error, if the dry run failed
    pub err: Option<TransactionError>,
    pub logs: Vec<String>,
    /// Post-execution state of the requested accounts, in request order
    pub accounts: Vec<Option<Account>>,
    pub units_consumed: Option<u64>,
}

/// Status of a submitted signature as reported by the node
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// On-chain execution error
    pub err: Option<TransactionError>,
    /// Depth reached so far; `None` while the node cannot say
    pub level: Option<ConfirmationLevel>,
}

/// Single-shot wire transport
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Endpoint label used in logs and errors
    fn endpoint(&self) -> &str;

    async fn get_account(&self, address: &Pubkey) -> RpcResult<Option<Account>>;

    /// One request for any number of addresses, answers in request order
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> RpcResult<Vec<Option<Account>>>;

    async fn get_latest_blockhash(&self) -> RpcResult<Hash>;

    /// Dry-run `transaction` and return the post state of `accounts`
    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
        accounts: &[Pubkey],
    ) -> RpcResult<SimulationOutcome>;

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        skip_preflight: bool,
    ) -> RpcResult<Signature>;

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> RpcResult<Vec<Option<SignatureStatus>>>;
}
