//! A concurrent, range-aware HTTP transport for accelerating single-resource downloads.
//!
//! [`RangeTripper`] probes a URL for `Range` support and, when available, splits the download
//! into chunks fetched concurrently through a bounded worker pool, assembling them into a file
//! or an in-memory buffer at their absolute offsets. Servers that only support whole-body GETs,
//! or that forbid `HEAD` but still serve ranged `GET`s, are handled transparently.
//!
//! A single [`RangeTripper`] is reusable across any number of [`Request`]s; all per-call state
//! (target URL, caller headers, output destination, progress channel) lives on [`Request`] and
//! [`Response`] rather than on the tripper itself.
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

pub mod config;
pub mod errors;
mod machinery;
pub mod planner;
pub mod probe;
pub mod request;
pub mod retry;
pub mod sink;

pub use config::{BackoffPolicy, Config, RetryConfig};
pub use errors::RangeTripperError;
pub use planner::{ChunkDescriptor, ChunkPlanner};
pub use request::{Body, ProgressSender, Request, Response};
pub use retry::RetryClient;
pub use sink::OutputSink;

/// Callback invoked with the wall-clock duration of a completed [`RangeTripper::round_trip`].
pub type TimingSink = Arc<dyn Fn(Duration) + Send + Sync>;

/// Callback invoked with a human-readable line describing a notable step of a download.
///
/// Distinct from `tracing`'s own output: this is for callers that want download-shaped
/// diagnostics surfaced through their own logging without configuring a `tracing` subscriber.
pub type DebugSink = Arc<dyn Fn(&str) + Send + Sync>;

/// A reusable, concurrent range-request download engine.
///
/// Construct once per desired configuration (chunk count, client, retry policy) and call
/// [`RangeTripper::round_trip`] as many times as needed; each call is independent.
#[derive(Clone)]
pub struct RangeTripper {
    config: Config,
    timing_sink: Option<TimingSink>,
    debug_sink: Option<DebugSink>,
}

impl RangeTripper {
    /// A tripper targeting `chunks` concurrent range requests, with default client and retry
    /// policy.
    pub fn new(chunks: usize) -> Self {
        Self {
            config: Config::new(chunks),
            timing_sink: None,
            debug_sink: None,
        }
    }

    /// Like [`RangeTripper::new`], additionally wiring optional timing and debug callbacks.
    pub fn new_with_loggers(
        chunks: usize,
        timing_sink: Option<TimingSink>,
        debug_sink: Option<DebugSink>,
    ) -> Self {
        Self {
            config: Config::new(chunks),
            timing_sink,
            debug_sink,
        }
    }

    /// Overrides the HTTP client used for probing and chunk fetches.
    pub fn set_client(mut self, client: Client) -> Self {
        self.config = self.config.client(client);
        self
    }

    /// Caps the number of concurrently in-flight chunk requests.
    pub fn set_max(mut self, max_concurrency: usize) -> Self {
        self.config = self.config.max_concurrency(max_concurrency);
        self
    }

    /// Switches the planner into fixed-chunk-size mode.
    pub fn set_chunk_size(mut self, bytes: u64) -> Self {
        self.config = self.config.chunk_size(bytes);
        self
    }

    /// Overrides the retry policy used for every sub-request.
    pub fn set_retry(mut self, retry: RetryConfig) -> Self {
        self.config = self.config.retry(retry);
        self
    }

    /// Validates the current configuration without performing a download.
    pub fn validated(self) -> Result<Self, anyhow::Error> {
        let config = self.config.validated()?;
        Ok(Self { config, ..self })
    }

    /// Performs one download: probes `request.url`, plans chunks if the server supports ranges,
    /// dispatches the worker pool, and assembles the result into `request`'s output destination.
    pub async fn round_trip(&self, request: Request) -> Result<Response, RangeTripperError> {
        machinery::orchestrator::execute(
            &self.config,
            request,
            self.timing_sink.clone(),
            self.debug_sink.clone(),
        )
        .await
    }
}
