//! LLM backend clients.
//!
//! Every provider is reached through the same capability: a prompt goes
//! in, text or a classified [`FailureKind`] comes out. Rate-limit
//! pacing, retry/backoff, and error classification live behind the
//! [`Backend`] trait so the generator (and tests) can treat providers
//! interchangeably.

mod http;

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use insightforge_shared::config::RetryConfig;

pub use http::HttpBackend;

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

/// Classified outcome of a failed backend call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// HTTP 429, provider quota pressure.
    RateLimited,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 401/403, bad or revoked credentials.
    AuthError,
    /// Any other HTTP 4xx; the request itself is wrong.
    ClientError,
    /// Request deadline elapsed.
    Timeout,
    /// Connection-level transport failure.
    NetworkError,
    /// Response arrived but the expected text could not be extracted.
    ParseError,
}

impl FailureKind {
    /// Transient failures are retried with backoff; the rest are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Timeout | Self::NetworkError
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::RateLimited => "rate-limited",
            Self::ServerError => "server-error",
            Self::AuthError => "auth-error",
            Self::ClientError => "client-error",
            Self::Timeout => "timeout",
            Self::NetworkError => "network-error",
            Self::ParseError => "parse-error",
        };
        write!(f, "{label}")
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// One prompt-in/text-out LLM provider integration.
///
/// `call` owns the provider's full rate/retry policy: callers see only
/// the final text or a terminal/exhausted failure, never a panic.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Short provider label for logs and reports.
    fn name(&self) -> &str;

    /// Estimated cost accrued by one call to this provider.
    fn cost_per_call_usd(&self) -> f64;

    async fn call(&self, prompt: &str) -> Result<String, FailureKind>;
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry/backoff policy applied per call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call (1 = no retries).
    pub max_retries: u32,
    /// Base backoff delay.
    pub base_delay: Duration,
    /// Exponential multiplier applied per retry.
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
            backoff_factor: config.backoff_factor,
        }
    }

    /// Backoff before retry number `retry` (1-based):
    /// `base_delay × backoff_factor^(retry - 1)`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        Duration::from_millis(millis as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

/// Enforces a provider's requests-per-minute budget.
///
/// Every attempt awaits `pace()` first, which sleeps until at least
/// `60_000 / rpm` ms have passed since the previous attempt. Backoff
/// delays are applied by the caller on top of this, never instead of it.
pub struct Pacer {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    /// `requests_per_minute == 0` disables pacing.
    pub fn new(requests_per_minute: u32) -> Self {
        let min_interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(60_000 / u64::from(requests_per_minute))
        };
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Suspend until the next call fits inside the rate budget.
    pub async fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
