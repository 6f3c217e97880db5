//! Per-call request/response types.
//!
//! Configuration (chunk count, client, retry policy) lives on [`crate::Config`] and is shared
//! across calls to [`crate::RangeTripper::round_trip`]; everything scoped to one call — the
//! target URL, caller headers, optional output path, optional progress sender — lives here.
use std::path::PathBuf;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tokio::sync::mpsc::Sender;
use url::Url;

/// Sender half of the progress channel.
///
/// The first value sent is the total content length (or 0 if unknown); every value after that
/// is the byte count of one completed chunk or whole-body fetch. Sends are best-effort
/// (non-blocking) so a slow or abandoned consumer cannot stall the download.
pub type ProgressSender = Sender<i64>;

/// A single download request.
pub struct Request {
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) output_path: Option<PathBuf>,
    pub(crate) progress: Option<ProgressSender>,
}

impl Request {
    /// A bare GET request for `url`.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
            output_path: None,
            progress: None,
        }
    }

    /// Adds a caller-supplied header, forwarded on every sub-request.
    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Assembles into a file at `path` instead of an in-memory buffer.
    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Attaches a channel to receive progress events for this request.
    pub fn progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }
}

/// The body of a synthesized [`Response`].
pub enum Body {
    /// The assembled bytes, for requests without an output path.
    Bytes(Bytes),
    /// The path of the file the response was assembled into.
    File(PathBuf),
}

/// The response returned by [`crate::RangeTripper::round_trip`].
///
/// Reflects the probe's status line and headers, with `Content-Length`/`Accept-Ranges`
/// possibly synthesized from `Content-Range` when head-fake recovery was used.
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Response {
    /// The declared or synthesized content length, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }
}
