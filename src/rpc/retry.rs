use super::config::RetryConfig;
use super::errors::{RpcError, RpcResult};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Backoff used when the configured initial delay is zero
const FALLBACK_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

impl RetryConfig {
    /// Calculate backoff delay before retry number `retry` (0-indexed)
    ///
    /// Doubles from the initial delay and stops at `max_backoff_ms`. With jitter
    /// the result is drawn uniformly from `[delay / 2, delay)`.
    pub fn calculate_backoff(&self, retry: u32) -> Duration {
        let mut delay = if self.initial_backoff_ms == 0 {
            FALLBACK_INITIAL_BACKOFF
        } else {
            Duration::from_millis(self.initial_backoff_ms)
        };
        let cap = Duration::from_millis(self.max_backoff_ms);

        for _ in 0..retry {
            delay = delay.saturating_mul(2);
            if !cap.is_zero() && delay >= cap {
                delay = cap;
                break;
            }
        }
        if !cap.is_zero() && delay > cap {
            delay = cap;
        }

        if self.jitter {
            let half = delay / 2;
            let spread = half.as_nanos().min(u64::MAX as u128) as u64;
            let reduction = if spread > 0 {
                rand::thread_rng().gen_range(0..spread)
            } else {
                0
            };
            delay = half + Duration::from_nanos(reduction);
        }

        delay
    }
}

/// Retry an async operation according to `config`
///
/// Every error for which `is_retryable` returns true is retried; others are
/// returned unchanged after the first failure. Cancellation is observed while
/// an attempt is in flight and while sleeping between attempts. Running out of
/// attempts yields [`RpcError::Exhausted`] naming the operation.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    cancel: &CancellationToken,
    is_retryable: impl Fn(&RpcError) -> bool,
    mut operation: F,
) -> RpcResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RpcResult<T>>,
{
    let start_time = Instant::now();
    let max_attempts = config.effective_attempts();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        if cancel.is_cancelled() {
            return Err(RpcError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RpcError::Cancelled),
            result = operation() => result,
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt,
                        duration_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            debug!(
                operation = operation_name,
                attempt,
                category = err.category(),
                error = %err,
                "Non-retryable error"
            );
            return Err(err);
        }

        if !config.enabled {
            return Err(err);
        }

        if attempt >= max_attempts {
            warn!(
                operation = operation_name,
                attempts = attempt,
                duration_ms = start_time.elapsed().as_millis() as u64,
                error = %err,
                "All retry attempts exhausted"
            );
            return Err(RpcError::Exhausted {
                operation: operation_name.to_string(),
                attempts: attempt,
                source: Box::new(err),
            });
        }

        let backoff = config.calculate_backoff(attempt - 1);
        debug!(
            operation = operation_name,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Retrying after backoff"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RpcError::Cancelled),
            _ = sleep(backoff) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            enabled: true,
            max_attempts,
            initial_backoff_ms: 10,
            max_backoff_ms: 40,
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = fast_config(5);
        assert_eq!(config.calculate_backoff(0), Duration::from_millis(10));
        assert_eq!(config.calculate_backoff(1), Duration::from_millis(20));
        assert_eq!(config.calculate_backoff(2), Duration::from_millis(40));
        assert_eq!(config.calculate_backoff(6), Duration::from_millis(40));
    }

    #[test]
    fn test_zero_initial_backoff_uses_fallback() {
        let config = RetryConfig {
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter: false,
            ..RetryConfig::default()
        };
        assert_eq!(config.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(config.calculate_backoff(2), Duration::from_millis(400));
    }

    #[test]
    fn test_jitter_stays_within_upper_half() {
        let config = RetryConfig {
            jitter: true,
            ..fast_config(3)
        };
        for _ in 0..200 {
            let backoff = config.calculate_backoff(1);
            assert!(backoff >= Duration::from_millis(10));
            assert!(backoff < Duration::from_millis(20));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_nth_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let counter = calls.clone();
        let result = retry_with_backoff("getLatestBlockhash", &fast_config(3), &token, RpcError::is_retryable, || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(RpcError::transport("http://node", "connection reset"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_operation_name() {
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let counter = calls.clone();
        let result: RpcResult<()> = retry_with_backoff("getMultipleAccounts", &fast_config(4), &token, RpcError::is_retryable, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RpcError::malformed("short account data"))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match &err {
            RpcError::Exhausted {
                operation,
                attempts,
                ..
            } => {
                assert_eq!(operation, "getMultipleAccounts");
                assert_eq!(*attempts, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("getMultipleAccounts failed after 4 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let counter = calls.clone();
        let result: RpcResult<()> = retry_with_backoff("sendTransaction", &fast_config(5), &token, RpcError::is_retryable, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RpcError::DeadlineExceeded { timeout_ms: 5 })
            }
        })
        .await;

        assert!(matches!(result, Err(RpcError::DeadlineExceeded { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();
        let config = RetryConfig {
            initial_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
            ..fast_config(3)
        };

        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let counter = calls.clone();
        let result: RpcResult<()> = retry_with_backoff("getSignatureStatuses", &config, &token, RpcError::is_retryable, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RpcError::transport("http://node", "503"))
            }
        })
        .await;

        assert!(matches!(result, Err(RpcError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_returns_raw_error() {
        let token = CancellationToken::new();
        let result: RpcResult<()> = retry_with_backoff("getAccountInfo", &RetryConfig::disabled(), &token, RpcError::is_retryable, || async {
            Err(RpcError::transport("http://node", "refused"))
        })
        .await;

        assert!(matches!(result, Err(RpcError::Transport { .. })));
    }
}
