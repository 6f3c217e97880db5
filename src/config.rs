//! Configuration for [`crate::RangeTripper`] and [`crate::RetryClient`].
use std::time::Duration;

use reqwest::Client;

/// Backoff policy used by [`crate::RetryClient`] between retried attempts.
#[derive(Debug, Clone, Copy)]
pub enum BackoffPolicy {
    /// Wait the same `interval` before every retry.
    Constant { interval: Duration },
    /// Wait `initial_delay * 2^attempt` before each successive retry.
    Exponential { initial_delay: Duration },
}

/// Construction parameters for a [`crate::RetryClient`].
///
/// `retries` is the number of *additional* attempts made after the first one fails.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub(crate) retries: u32,
    pub(crate) policy: BackoffPolicy,
    pub(crate) timeout: Duration,
}

impl RetryConfig {
    /// A retry policy with a constant wait `interval` between attempts.
    pub fn constant(retries: u32, interval: Duration, timeout: Duration) -> Self {
        Self {
            retries,
            policy: BackoffPolicy::Constant { interval },
            timeout,
        }
    }

    /// A retry policy with exponentially increasing waits, starting at `initial_delay`.
    pub fn exponential(retries: u32, initial_delay: Duration, timeout: Duration) -> Self {
        Self {
            retries,
            policy: BackoffPolicy::Exponential { initial_delay },
            timeout,
        }
    }

    /// No retries at all: a single attempt with the given per-attempt `timeout`.
    pub fn none(timeout: Duration) -> Self {
        Self::constant(0, Duration::from_millis(0), timeout)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::constant(3, Duration::from_millis(200), Duration::from_secs(30))
    }
}

/// Configuration for a [`crate::RangeTripper`].
///
/// Built with chained setters and validated once before use. Immutable for the lifetime of the
/// [`crate::RangeTripper`] it is attached to; per-request state (output path, progress sender,
/// caller headers) lives on [`crate::Request`] instead.
#[derive(Clone)]
pub struct Config {
    pub(crate) chunks: usize,
    pub(crate) chunk_size: Option<u64>,
    pub(crate) max_concurrency: Option<usize>,
    pub(crate) client: Client,
    pub(crate) retry: RetryConfig,
}

impl Config {
    /// Creates a configuration targeting `chunks` concurrent range requests.
    ///
    /// `chunks` is clamped to at least 1.
    pub fn new(chunks: usize) -> Self {
        Self {
            chunks: chunks.max(1),
            chunk_size: None,
            max_concurrency: None,
            client: Client::new(),
            retry: RetryConfig::default(),
        }
    }

    /// Overrides the HTTP client used for probing and chunk fetches.
    ///
    /// Both the probe (HEAD / head-fake) and the worker pool route requests through this client,
    /// so wrapping it in a [`crate::RetryClient`] applies retries everywhere.
    pub fn client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Caps the number of concurrently in-flight chunk requests.
    ///
    /// `m = 0` is treated as "no override" and leaves the default (`chunks + 1`) in place.
    pub fn max_concurrency(mut self, m: usize) -> Self {
        if m != 0 {
            self.max_concurrency = Some(m);
        }
        self
    }

    /// Switches the planner into fixed-chunk-size mode.
    ///
    /// `bytes < 1` is clamped to 1.
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = Some(bytes.max(1));
        self
    }

    /// Overrides the retry policy used for every sub-request.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validates the configuration, failing on nonsensical combinations.
    pub fn validated(self) -> Result<Self, anyhow::Error> {
        if self.chunks == 0 {
            return Err(anyhow::Error::msg("chunks must be at least 1"));
        }
        if let Some(size) = self.chunk_size {
            if size == 0 {
                return Err(anyhow::Error::msg("chunk_size must be at least 1 byte"));
            }
        }
        Ok(self)
    }

    /// The worker-pool semaphore capacity for a plan that ended up with `effective_chunks`
    /// workers: the overridden max if one was set, otherwise `effective_chunks + 1`.
    ///
    /// `effective_chunks` can differ from `self.chunks` in fixed-chunk-size mode, where the
    /// worker count is driven by `content_length / chunk_size` rather than the configured target.
    pub(crate) fn semaphore_capacity(&self, effective_chunks: usize) -> usize {
        self.max_concurrency.unwrap_or(effective_chunks + 1).max(1)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("chunks", &self.chunks)
            .field("chunk_size", &self.chunk_size)
            .field("max_concurrency", &self.max_concurrency)
            .field("retry", &self.retry)
            .finish()
    }
}
