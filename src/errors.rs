//! Stable error identities returned by [`crate::RangeTripper`] and its collaborators.
use http::StatusCode;
use thiserror::Error;

/// Errors produced while probing, planning, dispatching or assembling a download.
#[derive(Error, Debug)]
pub enum RangeTripperError {
    /// `Content-Length` was present on the probe response but could not be parsed as a
    /// non-negative integer.
    #[error("content-length header could not be parsed as an integer")]
    ContentLengthNumeric,

    /// The assembled output did not end up with the length the probe declared.
    #[error("content length mismatch: expected {expected} bytes, assembled {actual}")]
    ContentLengthMismatch {
        /// Length declared by the probe.
        expected: u64,
        /// Length actually present in the output sink after assembly.
        actual: u64,
    },

    /// Retained for API-identity parity with the v1, single-use orchestrator. The v2 engine
    /// (this crate) never constructs this variant since [`crate::RangeTripper`] is reusable and
    /// request-scoped state lives in [`crate::Request`].
    #[error("this RangeTripper instance has already served a request")]
    SingleRequestExhausted,

    /// The probe (HEAD, and head-fake recovery where applicable) ended inconclusively.
    #[error("probe request failed with status {0}")]
    HeadFailed(StatusCode),

    /// [`crate::RetryClient`] received a 4xx response, which is not retried.
    #[error("non-retriable status: {0}")]
    NonRetriableStatus(StatusCode),

    /// A filesystem operation on the output sink failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying HTTP client reported a transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A chunk worker failed for a reason not covered by a more specific variant.
    #[error("chunk download failed: {0}")]
    ChunkFailed(String),
}

impl Clone for RangeTripperError {
    /// Workers race to record the first error into a shared cell; the cell needs to hand back
    /// independent owned copies to both the dispatcher and the final caller.
    fn clone(&self) -> Self {
        match self {
            Self::ContentLengthNumeric => Self::ContentLengthNumeric,
            Self::ContentLengthMismatch { expected, actual } => Self::ContentLengthMismatch {
                expected: *expected,
                actual: *actual,
            },
            Self::SingleRequestExhausted => Self::SingleRequestExhausted,
            Self::HeadFailed(status) => Self::HeadFailed(*status),
            Self::NonRetriableStatus(status) => Self::NonRetriableStatus(*status),
            Self::Io(err) => Self::Io(std::io::Error::new(err.kind(), err.to_string())),
            Self::Http(err) => Self::ChunkFailed(err.to_string()),
            Self::ChunkFailed(msg) => Self::ChunkFailed(msg.clone()),
        }
    }
}
