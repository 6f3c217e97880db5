//! [`WorkerPool`]: bounded-concurrency dispatch of planned chunk fetches.
use std::sync::{Arc, Mutex};

use http::HeaderMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

use crate::errors::RangeTripperError;
use crate::planner::ChunkDescriptor;
use crate::request::ProgressSender;
use crate::retry::RetryClient;
use crate::sink::OutputSink;

/// One fatal error, recorded at most once (last-writer-wins is fine: the first-observed error
/// already gates the dispatcher).
type ErrorCell = Arc<Mutex<Option<RangeTripperError>>>;

/// Dispatches `descriptors` against `url` with at most `concurrency` chunk fetches in flight.
///
/// Every worker writes its chunk to `sink` at the chunk's absolute offset. If any worker fails,
/// the dispatcher stops handing out new chunks (already-running workers are cooperatively
/// cancelled via a [`CancellationToken`] and allowed to drain) and the first recorded error is
/// returned once every spawned worker has been joined.
pub async fn run(
    descriptors: Vec<ChunkDescriptor>,
    url: Url,
    headers: HeaderMap,
    client: RetryClient,
    sink: OutputSink,
    concurrency: usize,
    progress: Option<ProgressSender>,
) -> Result<(), RangeTripperError> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let error_cell: ErrorCell = Arc::new(Mutex::new(None));
    let cancel = CancellationToken::new();
    let mut joined = JoinSet::new();

    let planned = descriptors.len();
    let mut dispatched = 0usize;

    for descriptor in descriptors {
        if error_cell.lock().expect("error cell poisoned").is_some() {
            debug!(planned, dispatched, "error already recorded, halting dispatch");
            break;
        }

        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .expect("semaphore is never closed");

        let url = url.clone();
        let headers = headers.clone();
        let client = client.clone();
        let sink = sink.clone();
        let error_cell = Arc::clone(&error_cell);
        let cancel = cancel.clone();
        let progress = progress.clone();

        dispatched += 1;

        joined.spawn(async move {
            let _permit = permit;

            if cancel.is_cancelled() {
                return;
            }

            match fetch_chunk(&client, &url, &headers, descriptor, &cancel).await {
                Ok(bytes) => {
                    let len = bytes.len() as u64;
                    if let Err(err) = sink.write_at(descriptor.start, bytes).await {
                        record_error(&error_cell, RangeTripperError::Io(err));
                        cancel.cancel();
                        return;
                    }
                    if let Some(sender) = &progress {
                        let _ = sender.try_send(len as i64);
                    }
                }
                Err(err) => {
                    error!(chunk = descriptor.index, "chunk fetch failed: {err}");
                    record_error(&error_cell, err);
                    cancel.cancel();
                }
            }
        });
    }

    while let Some(result) = joined.join_next().await {
        if let Err(join_err) = result {
            if join_err.is_panic() {
                record_error(
                    &error_cell,
                    RangeTripperError::ChunkFailed("a chunk worker panicked".to_string()),
                );
            }
        }
    }

    let recorded = error_cell.lock().expect("error cell poisoned").take();
    match recorded {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn record_error(cell: &ErrorCell, err: RangeTripperError) {
    let mut guard = cell.lock().expect("error cell poisoned");
    if guard.is_none() {
        *guard = Some(err);
    }
}

async fn fetch_chunk(
    client: &RetryClient,
    url: &Url,
    headers: &HeaderMap,
    descriptor: ChunkDescriptor,
    cancel: &CancellationToken,
) -> Result<bytes::Bytes, RangeTripperError> {
    let range_value = format!("bytes={}-{}", descriptor.start, descriptor.end - 1);

    let mut builder = client.inner().get(url.clone()).headers(headers.clone());
    builder = builder.header(http::header::RANGE, range_value);
    let request = builder
        .build()
        .expect("range requests built from a validated URL are always well-formed");

    let fetch = client.execute(request);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RangeTripperError::ChunkFailed(
            "cancelled after a sibling chunk failed".to_string(),
        )),
        result = fetch => {
            let response = result?;
            response.bytes().await.map_err(RangeTripperError::Http)
        }
    }
}
