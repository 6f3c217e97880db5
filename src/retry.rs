//! [`RetryClient`]: a constant- or exponential-backoff wrapper around a single HTTP request.
use reqwest::{Client, Request, Response};
use tracing::{debug, warn};

use crate::config::{BackoffPolicy, RetryConfig};
use crate::errors::RangeTripperError;

/// Wraps a [`reqwest::Client`] with a bounded-retry policy.
///
/// Transport errors, timeouts and 3xx/5xx statuses are retried with backoff; 4xx statuses are
/// surfaced immediately as [`RangeTripperError::NonRetriableStatus`] since retrying will not help.
#[derive(Clone)]
pub struct RetryClient {
    client: Client,
    config: RetryConfig,
}

impl RetryClient {
    pub fn new(client: Client, config: RetryConfig) -> Self {
        Self { client, config }
    }

    /// The underlying client, exposed so collaborators (the probe, request builders) can issue
    /// requests through the same configured client rather than a process-global default.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Executes `request`, retrying according to the configured policy.
    ///
    /// `request` must be cloneable via [`reqwest::Request::try_clone`] — bodyless GETs (the only
    /// requests this crate issues) always are.
    pub async fn execute(&self, request: Request) -> Result<Response, RangeTripperError> {
        let mut attempt: u32 = 0;

        loop {
            let attempt_request = request
                .try_clone()
                .expect("rangetripper only issues bodyless GET requests, which are cloneable");

            let outcome = tokio::time::timeout(
                self.config.timeout,
                self.client.execute(attempt_request),
            )
            .await;

            let result = match outcome {
                Ok(Ok(response)) => classify(response),
                Ok(Err(err)) => Classification::Retriable(RangeTripperError::Http(err)),
                Err(_) => Classification::Retriable(RangeTripperError::ChunkFailed(format!(
                    "request timed out after {:?}",
                    self.config.timeout
                ))),
            };

            match result {
                Classification::Success(response) => return Ok(response),
                Classification::NonRetriable(err) => return Err(err),
                Classification::Retriable(err) => {
                    if attempt >= self.config.retries {
                        warn!(%attempt, "giving up after exhausting retries: {err}");
                        return Err(err);
                    }

                    let delay = self.delay_for(attempt);
                    debug!(%attempt, ?delay, "retrying after error: {err}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> std::time::Duration {
        match self.config.policy {
            BackoffPolicy::Constant { interval } => interval,
            BackoffPolicy::Exponential { initial_delay } => {
                initial_delay.saturating_mul(1u32 << attempt.min(20))
            }
        }
    }
}

enum Classification {
    Success(Response),
    Retriable(RangeTripperError),
    NonRetriable(RangeTripperError),
}

fn classify(response: Response) -> Classification {
    let status = response.status();

    if status.is_success() {
        return Classification::Success(response);
    }

    if (400..500).contains(&status.as_u16()) {
        return Classification::NonRetriable(RangeTripperError::NonRetriableStatus(status));
    }

    Classification::Retriable(RangeTripperError::ChunkFailed(format!(
        "unexpected status {status}"
    )))
}
