use super::config::{ConfigError, RpcConfig};
use super::errors::{RpcError, RpcResult};
use super::retry::retry_with_backoff;
use super::{RpcTransport, SignatureStatus, SimulationOutcome};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Rate-limited, deadline-bounded, retrying wrapper around a transport
///
/// Cloning is cheap and clones share one limiter, so independent trade builds
/// running concurrently still respect the aggregate request budget.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn RpcTransport>,
    config: RpcConfig,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("endpoint", &self.transport.endpoint())
            .field("config", &self.config)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn RpcTransport>, config: RpcConfig) -> Result<Self, ConfigError> {
        let limiter = build_limiter(&config)?;
        Ok(Self {
            transport,
            config,
            limiter,
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Run one logical remote call
    ///
    /// Each attempt first waits for a limiter token, then invokes `f`. The
    /// configured deadline bounds the whole call including backoff sleeps.
    pub async fn call<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        mut f: F,
    ) -> RpcResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RpcResult<T>>,
    {
        let attempts = retry_with_backoff(
            operation,
            &self.config.retry,
            cancel,
            RpcError::is_retryable,
            || {
                let attempt = f();
                async move {
                    self.acquire(cancel).await?;
                    attempt.await
                }
            },
        );

        match self.config.timeout() {
            Some(deadline) => match tokio::time::timeout(deadline, attempts).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(
                        operation,
                        timeout_ms = deadline.as_millis() as u64,
                        "Call deadline exceeded"
                    );
                    Err(RpcError::DeadlineExceeded {
                        timeout_ms: deadline.as_millis() as u64,
                    })
                }
            },
            None => attempts.await,
        }
    }

    /// Wait for a limiter token or cancellation
    async fn acquire(&self, cancel: &CancellationToken) -> RpcResult<()> {
        if let Some(limiter) = &self.limiter {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RpcError::Cancelled),
                _ = limiter.until_ready() => {}
            }
        }
        Ok(())
    }

    pub async fn get_account(
        &self,
        cancel: &CancellationToken,
        address: &Pubkey,
    ) -> RpcResult<Option<Account>> {
        self.call(cancel, "getAccountInfo", || self.transport.get_account(address))
            .await
    }

    pub async fn get_multiple_accounts(
        &self,
        cancel: &CancellationToken,
        addresses: &[Pubkey],
    ) -> RpcResult<Vec<Option<Account>>> {
        self.call(cancel, "getMultipleAccounts", || {
            self.transport.get_multiple_accounts(addresses)
        })
        .await
    }

    pub async fn get_latest_blockhash(&self, cancel: &CancellationToken) -> RpcResult<Hash> {
        self.call(cancel, "getLatestBlockhash", || {
            self.transport.get_latest_blockhash()
        })
        .await
    }

    /// One attempt only: limiter, cancellation and deadline, no retry loop
    ///
    /// For calls whose caller owns the repeat policy (dry runs, status polls).
    pub async fn call_once<T, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        attempt: Fut,
    ) -> RpcResult<T>
    where
        Fut: Future<Output = RpcResult<T>>,
    {
        self.acquire(cancel).await?;
        let guarded = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RpcError::Cancelled),
                result = attempt => result,
            }
        };
        match self.config.timeout() {
            Some(deadline) => match tokio::time::timeout(deadline, guarded).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(
                        operation,
                        timeout_ms = deadline.as_millis() as u64,
                        "Call deadline exceeded"
                    );
                    Err(RpcError::DeadlineExceeded {
                        timeout_ms: deadline.as_millis() as u64,
                    })
                }
            },
            None => guarded.await,
        }
    }

    /// Dry run; never retried because a second run may observe different state
    pub async fn simulate_transaction(
        &self,
        cancel: &CancellationToken,
        transaction: &Transaction,
        accounts: &[Pubkey],
    ) -> RpcResult<SimulationOutcome> {
        self.call_once(
            cancel,
            "simulateTransaction",
            self.transport.simulate_transaction(transaction, accounts),
        )
        .await
    }

    pub async fn send_transaction(
        &self,
        cancel: &CancellationToken,
        transaction: &Transaction,
        skip_preflight: bool,
    ) -> RpcResult<Signature> {
        self.call(cancel, "sendTransaction", || {
            self.transport.send_transaction(transaction, skip_preflight)
        })
        .await
    }

    pub async fn get_signature_statuses(
        &self,
        cancel: &CancellationToken,
        signatures: &[Signature],
    ) -> RpcResult<Vec<Option<SignatureStatus>>> {
        self.call(cancel, "getSignatureStatuses", || {
            self.transport.get_signature_statuses(signatures)
        })
        .await
    }

    /// Single status query for pollers that retry on their own schedule
    pub async fn poll_signature_statuses(
        &self,
        cancel: &CancellationToken,
        signatures: &[Signature],
    ) -> RpcResult<Vec<Option<SignatureStatus>>> {
        self.call_once(
            cancel,
            "getSignatureStatuses",
            self.transport.get_signature_statuses(signatures),
        )
        .await
    }
}

fn build_limiter(config: &RpcConfig) -> Result<Option<Arc<DefaultDirectRateLimiter>>, ConfigError> {
    let limit = &config.rate_limit;
    if !limit.is_enabled() {
        return Ok(None);
    }

    let period = Duration::from_secs_f64(1.0 / limit.rps);
    let burst = NonZeroU32::new(limit.effective_burst()).ok_or_else(|| {
        ConfigError::ValidationError("Rate limit burst must be > 0".to_string())
    })?;
    let quota = Quota::with_period(period)
        .ok_or_else(|| ConfigError::ValidationError(format!("Invalid rate limit: {} rps", limit.rps)))?
        .allow_burst(burst);

    Ok(Some(Arc::new(RateLimiter::direct(quota))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::config::{RateLimitConfig, RetryConfig};
    use crate::test_utils::MockTransport;
    use std::time::Instant;

    fn config(rps: f64, burst: u32) -> RpcConfig {
        RpcConfig {
            retry: RetryConfig {
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                jitter: false,
                ..RetryConfig::default()
            },
            rate_limit: RateLimitConfig { rps, burst },
            ..RpcConfig::from_url("http://mock")
        }
    }

    #[test]
    fn test_limiter_disabled_for_non_positive_rate() {
        assert!(build_limiter(&config(0.0, 5)).unwrap().is_none());
        assert!(build_limiter(&config(-1.0, 5)).unwrap().is_none());
        assert!(build_limiter(&config(10.0, 0)).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next("getLatestBlockhash", 2, RpcError::transport("http://mock", "reset"));
        let client = ResilientClient::new(transport.clone(), config(0.0, 0)).unwrap();

        let token = CancellationToken::new();
        client.get_latest_blockhash(&token).await.unwrap();
        assert_eq!(transport.calls("getLatestBlockhash"), 3);
    }

    #[tokio::test]
    async fn test_simulation_is_single_shot() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next("simulateTransaction", 1, RpcError::transport("http://mock", "reset"));
        let client = ResilientClient::new(transport.clone(), config(0.0, 0)).unwrap();

        let token = CancellationToken::new();
        let tx = Transaction::default();
        assert!(client.simulate_transaction(&token, &tx, &[]).await.is_err());
        assert_eq!(transport.calls("simulateTransaction"), 1);
    }

    #[tokio::test]
    async fn test_status_poll_is_single_shot() {
        let transport = Arc::new(MockTransport::new());
        transport.push_statuses(Err(RpcError::transport("http://mock", "reset")));
        let client = ResilientClient::new(transport.clone(), config(0.0, 0)).unwrap();

        let token = CancellationToken::new();
        let sigs = [Signature::default()];
        assert!(client.poll_signature_statuses(&token, &sigs).await.is_err());
        assert_eq!(transport.calls("getSignatureStatuses"), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_makes_no_call() {
        let transport = Arc::new(MockTransport::new());
        let client = ResilientClient::new(transport.clone(), config(0.0, 0)).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = client.get_latest_blockhash(&token).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(transport.calls("getLatestBlockhash"), 0);
    }

    #[tokio::test]
    async fn test_limiter_spaces_calls_beyond_burst() {
        let transport = Arc::new(MockTransport::new());
        let client = ResilientClient::new(transport.clone(), config(20.0, 1)).unwrap();
        let token = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..3 {
            client.get_latest_blockhash(&token).await.unwrap();
        }
        // one burst token, then two refills at 50ms each
        assert!(start.elapsed() >= Duration::from_millis(90));
        assert_eq!(transport.calls("getLatestBlockhash"), 3);
    }
}
