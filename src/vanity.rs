//! Vanity Keypair Search
//!
//! A fixed pool of OS threads generates random keypairs until one address
//! matches the requested prefix and/or suffix. Workers share only an atomic
//! "found" flag, an atomic attempt counter and a single-slot result channel:
//! the first worker to flip the flag via compare-and-swap owns the result and
//! every other worker exits on its next flag check.
//!
//! Matching is case-sensitive unless `case_insensitive` is set, in which case
//! both the address and the patterns are lowercased before comparison.

use crossbeam::channel;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use solana_sdk::signature::{Keypair, Signer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Longest base58 encoding of a 32-byte key
const MAX_ADDRESS_LEN: usize = 44;

const BASE58_PATTERN: &str = "^[1-9A-HJ-NP-Za-km-z]*$";

static BASE58: Lazy<Regex> =
    Lazy::new(|| Regex::new(BASE58_PATTERN).expect("Failed to compile base58 pattern"));

static BASE58_ANY_CASE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(BASE58_PATTERN)
        .case_insensitive(true)
        .build()
        .expect("Failed to compile base58 pattern")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VanityError {
    #[error("prefix or suffix is required")]
    MissingPattern,

    /// The pattern can never match a base58 address
    #[error("invalid vanity pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("vanity search timed out after {attempts} attempts ({elapsed_ms} ms)")]
    Timeout { attempts: u64, elapsed_ms: u64 },

    #[error("vanity search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("vanity worker failed: {0}")]
    Worker(String),
}

/// Search parameters
#[derive(Debug, Clone, Default)]
pub struct VanityOptions {
    pub prefix: String,
    pub suffix: String,
    /// 0 selects the available parallelism
    pub workers: usize,
    /// `None` searches until cancelled
    pub timeout: Option<Duration>,
    pub case_insensitive: bool,
}

impl VanityOptions {
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Reject searches that can never succeed, before any worker starts
    pub fn validate(&self) -> Result<(), VanityError> {
        if self.prefix.is_empty() && self.suffix.is_empty() {
            return Err(VanityError::MissingPattern);
        }
        for pattern in [&self.prefix, &self.suffix] {
            validate_pattern(pattern, self.case_insensitive)?;
        }
        if self.prefix.len() + self.suffix.len() > MAX_ADDRESS_LEN {
            return Err(VanityError::InvalidPattern {
                pattern: format!("{}..{}", self.prefix, self.suffix),
                reason: format!("longer than {} characters", MAX_ADDRESS_LEN),
            });
        }
        Ok(())
    }

    fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Winning keypair with search statistics
#[derive(Debug)]
pub struct VanityResult {
    pub keypair: Keypair,
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Expected number of attempts for the given pattern lengths
pub fn estimate_difficulty(prefix_len: usize, suffix_len: usize) -> u64 {
    let total = (prefix_len + suffix_len) as u32;
    58u64.saturating_pow(total)
}

fn validate_pattern(pattern: &str, case_insensitive: bool) -> Result<(), VanityError> {
    let alphabet = if case_insensitive {
        &*BASE58_ANY_CASE
    } else {
        &*BASE58
    };
    if alphabet.is_match(pattern) {
        return Ok(());
    }
    let bad = pattern
        .chars()
        .find(|c| !alphabet.is_match(&c.to_string()))
        .unwrap_or('?');
    Err(VanityError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: format!("character '{}' is not in the base58 alphabet", bad),
    })
}

struct Matcher {
    prefix: String,
    suffix: String,
    case_insensitive: bool,
}

impl Matcher {
    fn new(options: &VanityOptions) -> Self {
        let fold = |s: &str| {
            if options.case_insensitive {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        Self {
            prefix: fold(&options.prefix),
            suffix: fold(&options.suffix),
            case_insensitive: options.case_insensitive,
        }
    }

    fn matches(&self, address: &str) -> bool {
        if self.case_insensitive {
            let lowered = address.to_lowercase();
            lowered.starts_with(&self.prefix) && lowered.ends_with(&self.suffix)
        } else {
            address.starts_with(&self.prefix) && address.ends_with(&self.suffix)
        }
    }
}

/// Run the search on the calling thread's scope; blocks until done
#[instrument(skip(cancel), fields(prefix = %options.prefix, suffix = %options.suffix))]
pub fn search_blocking(
    options: &VanityOptions,
    cancel: &CancellationToken,
) -> Result<VanityResult, VanityError> {
    options.validate()?;

    let workers = options.effective_workers();
    let deadline = options.timeout.map(|t| Instant::now() + t);
    let matcher = Matcher::new(options);
    let found = AtomicBool::new(false);
    let attempts = AtomicU64::new(0);
    let (tx, rx) = channel::bounded::<Keypair>(1);
    let started = Instant::now();

    debug!(
        workers,
        difficulty = estimate_difficulty(options.prefix.len(), options.suffix.len()),
        "Starting vanity search"
    );

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let (matcher, found, attempts) = (&matcher, &found, &attempts);
            scope.spawn(move || {
                while !found.load(Ordering::Acquire) {
                    if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                        return;
                    }

                    let keypair = Keypair::new();
                    attempts.fetch_add(1, Ordering::Relaxed);
                    if !matcher.matches(&keypair.pubkey().to_string()) {
                        continue;
                    }

                    if found
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        let _ = tx.try_send(keypair);
                    }
                    return;
                }
            });
        }
    });
    drop(tx);

    let attempts = attempts.load(Ordering::Relaxed);
    let elapsed = started.elapsed();

    if let Ok(keypair) = rx.try_recv() {
        info!(
            address = %keypair.pubkey(),
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Vanity address found"
        );
        return Ok(VanityResult {
            keypair,
            attempts,
            elapsed,
        });
    }

    if cancel.is_cancelled() {
        return Err(VanityError::Cancelled { attempts });
    }
    Err(VanityError::Timeout {
        attempts,
        elapsed_ms: elapsed.as_millis() as u64,
    })
}

/// Async entry point; workers run on the blocking pool
///
/// Dropping the returned future cancels the workers.
pub async fn search(
    options: VanityOptions,
    cancel: &CancellationToken,
) -> Result<VanityResult, VanityError> {
    options.validate()?;

    let token = cancel.child_token();
    let guard = token.clone().drop_guard();
    let result = tokio::task::spawn_blocking(move || search_blocking(&options, &token))
        .await
        .map_err(|e| VanityError::Worker(e.to_string()))?;
    guard.disarm();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_found_with_four_workers() {
        let options = VanityOptions {
            suffix: "ab".to_string(),
            workers: 4,
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let result = search_blocking(&options, &CancellationToken::new()).unwrap();
        assert!(result.keypair.pubkey().to_string().ends_with("ab"));
        assert!(result.attempts >= 1);
    }

    #[test]
    fn test_case_insensitive_prefix() {
        let options = VanityOptions {
            prefix: "x".to_string(),
            workers: 2,
            timeout: Some(Duration::from_secs(30)),
            case_insensitive: true,
            ..Default::default()
        };
        let result = search_blocking(&options, &CancellationToken::new()).unwrap();
        assert!(result
            .keypair
            .pubkey()
            .to_string()
            .to_lowercase()
            .starts_with('x'));
    }

    #[test]
    fn test_empty_patterns_rejected_before_search() {
        let options = VanityOptions::default();
        assert_eq!(
            search_blocking(&options, &CancellationToken::new()).unwrap_err(),
            VanityError::MissingPattern
        );
    }

    #[test]
    fn test_pattern_outside_alphabet() {
        let err = VanityOptions::with_suffix("p0mp").validate().unwrap_err();
        assert!(matches!(err, VanityError::InvalidPattern { .. }));
        assert!(err.to_string().contains("'0'"));

        // 'l' is not base58 but 'L' is
        assert!(VanityOptions::with_prefix("lol").validate().is_err());
        let options = VanityOptions {
            prefix: "lol".to_string(),
            case_insensitive: true,
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_timeout_reports_attempts() {
        let options = VanityOptions {
            suffix: "zzzzzzzz".to_string(),
            workers: 1,
            timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let err = search_blocking(&options, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, VanityError::Timeout { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let err = search_blocking(&VanityOptions::with_suffix("zzzzzz"), &token).unwrap_err();
        assert_eq!(err, VanityError::Cancelled { attempts: 0 });
    }

    #[tokio::test]
    async fn test_async_search() {
        let options = VanityOptions {
            suffix: "a".to_string(),
            workers: 2,
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let result = search(options, &CancellationToken::new()).await.unwrap();
        assert!(result.keypair.pubkey().to_string().ends_with('a'));
    }

    #[test]
    fn test_estimate_difficulty() {
        assert_eq!(estimate_difficulty(0, 0), 1);
        assert_eq!(estimate_difficulty(2, 2), 58u64.pow(4));
        assert_eq!(estimate_difficulty(20, 20), u64::MAX);
    }
}
