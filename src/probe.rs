//! [`ProbeEngine`]: determines whether a URL supports ranged downloads and its total length.
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use reqwest::{Client, Response};
use tracing::{debug, warn};
use url::Url;

use crate::errors::RangeTripperError;
use crate::retry::RetryClient;
use crate::sink::OutputSink;

const HEAD_FAKE_RANGE: &str = "bytes=0-10";

/// Outcome of probing a URL.
pub enum ProbeOutcome {
    /// The response body was already streamed into the sink (head-fake 200, or a whole-body
    /// fallback performed by the probe itself). The caller only needs to surface the response.
    Streamed {
        status: StatusCode,
        headers: HeaderMap,
    },
    /// Content length is known (or unknown) but the server did not declare range support; the
    /// caller must perform a plain whole-body GET.
    WholeBody {
        status: StatusCode,
        headers: HeaderMap,
        content_length: Option<u64>,
    },
    /// The server supports ranged downloads at the given content length.
    Ranged {
        status: StatusCode,
        headers: HeaderMap,
        content_length: u64,
    },
}

/// Probes `url` for range support, issuing HEAD (and, if needed, a head-fake GET) through
/// `client`.
pub struct ProbeEngine<'a> {
    client: &'a RetryClient,
}

impl<'a> ProbeEngine<'a> {
    pub fn new(client: &'a RetryClient) -> Self {
        Self { client }
    }

    pub async fn probe(
        &self,
        url: &Url,
        headers: &HeaderMap,
        sink: &OutputSink,
    ) -> Result<ProbeOutcome, RangeTripperError> {
        let head_request = build_request(self.client.inner(), url.clone(), headers, Method::Head, None);
        let head_result = self.client.execute(head_request).await;

        let probe_response = match head_result {
            Ok(response) if response.status() == StatusCode::OK || response.status() == StatusCode::PARTIAL_CONTENT => {
                response
            }
            Ok(response) if response.status() == StatusCode::FORBIDDEN => {
                debug!(%url, "HEAD forbidden, attempting head-fake recovery");
                let original_err = RangeTripperError::HeadFailed(StatusCode::FORBIDDEN);
                return self.try_head_fake(url, headers, sink, Some(original_err)).await;
            }
            Ok(response) => {
                return Err(RangeTripperError::HeadFailed(response.status()));
            }
            Err(err) => {
                warn!(%url, "HEAD failed ({err}), attempting head-fake recovery");
                return self.try_head_fake(url, headers, sink, Some(err)).await;
            }
        };

        self.classify(probe_response).await
    }

    /// Performs the head-fake recovery policy: a 0-10 byte range GET used to infer range
    /// support when HEAD is unavailable or forbidden.
    ///
    /// `original_err`, if any, is the error that triggered this recovery attempt; it is returned
    /// unchanged if the head-fake itself fails to produce a usable outcome.
    async fn try_head_fake(
        &self,
        url: &Url,
        headers: &HeaderMap,
        sink: &OutputSink,
        original_err: Option<RangeTripperError>,
    ) -> Result<ProbeOutcome, RangeTripperError> {
        let fake_request = build_request(
            self.client.inner(),
            url.clone(),
            headers,
            Method::Get,
            Some(HEAD_FAKE_RANGE),
        );

        let response = match self.client.execute(fake_request).await {
            Ok(response) => response,
            Err(head_fake_err) => {
                return Err(original_err.unwrap_or(head_fake_err));
            }
        };

        match response.status() {
            StatusCode::OK => {
                let status = response.status();
                let headers = response.headers().clone();
                let bytes = response.bytes().await.map_err(RangeTripperError::Http)?;
                sink.write(bytes).await?;
                Ok(ProbeOutcome::Streamed { status, headers })
            }
            StatusCode::PARTIAL_CONTENT => {
                if let Some(total) = total_from_content_range(response.headers()) {
                    let mut headers = response.headers().clone();
                    headers.insert(
                        http::header::CONTENT_LENGTH,
                        HeaderValue::from_str(&total.to_string()).expect("digits are valid header value"),
                    );
                    headers.insert(
                        http::header::ACCEPT_RANGES,
                        HeaderValue::from_static("bytes"),
                    );
                    Ok(ProbeOutcome::Ranged {
                        status: response.status(),
                        headers,
                        content_length: total,
                    })
                } else {
                    Err(original_err.unwrap_or(RangeTripperError::HeadFailed(response.status())))
                }
            }
            status => Err(original_err.unwrap_or(RangeTripperError::HeadFailed(status))),
        }
    }

    async fn classify(&self, response: Response) -> Result<ProbeOutcome, RangeTripperError> {
        let status = response.status();
        let headers = response.headers().clone();

        let content_length = match headers.get(http::header::CONTENT_LENGTH) {
            None => None,
            Some(value) => {
                let parsed: u64 = value
                    .to_str()
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(RangeTripperError::ContentLengthNumeric)?;
                Some(parsed)
            }
        };

        let supports_ranges = headers
            .get(http::header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);

        match (content_length, supports_ranges) {
            (Some(length), true) => Ok(ProbeOutcome::Ranged {
                status,
                headers,
                content_length: length,
            }),
            (length, _) => Ok(ProbeOutcome::WholeBody {
                status,
                headers,
                content_length: length,
            }),
        }
    }
}

/// Fetches the whole body of `url` and streams it into `sink`, returning the response's status,
/// headers, and the number of bytes written. Used for the plain whole-body fallback (content
/// length unknown, or no range support declared).
pub async fn fetch_whole_body(
    client: &RetryClient,
    url: &Url,
    headers: &HeaderMap,
    sink: &OutputSink,
) -> Result<(StatusCode, HeaderMap, u64), RangeTripperError> {
    let request = build_request(client.inner(), url.clone(), headers, Method::Get, None);
    let response = client.execute(request).await?;
    let status = response.status();
    let response_headers = response.headers().clone();
    let bytes: Bytes = response.bytes().await.map_err(RangeTripperError::Http)?;
    let len = bytes.len() as u64;
    sink.write(bytes).await?;
    Ok((status, response_headers, len))
}

fn total_from_content_range(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(http::header::CONTENT_RANGE)?.to_str().ok()?;
    let total = value.rsplit('/').next()?;
    if total == "*" {
        return None;
    }
    total.parse().ok()
}

enum Method {
    Head,
    Get,
}

fn build_request(
    client: &Client,
    url: Url,
    headers: &HeaderMap,
    method: Method,
    range: Option<&str>,
) -> reqwest::Request {
    let mut builder = match method {
        Method::Head => client.head(url),
        Method::Get => client.get(url),
    };
    builder = builder.headers(headers.clone());
    if let Some(range) = range {
        builder = builder.header(http::header::RANGE, range);
    }
    builder.build().expect("probe requests are always well-formed")
}
