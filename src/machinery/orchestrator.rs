//! The `round_trip` state machine: probe, plan, dispatch, assemble.
use std::time::Instant;

use tracing::debug;

use crate::config::Config;
use crate::errors::RangeTripperError;
use crate::machinery::pool;
use crate::planner::ChunkPlanner;
use crate::probe::{self, ProbeEngine, ProbeOutcome};
use crate::request::{Body, Request, Response};
use crate::retry::RetryClient;
use crate::sink::OutputSink;
use crate::{DebugSink, TimingSink};

pub(crate) async fn execute(
    config: &Config,
    request: Request,
    timing_sink: Option<TimingSink>,
    debug_sink: Option<DebugSink>,
) -> Result<Response, RangeTripperError> {
    let started = Instant::now();

    let Request {
        url,
        headers,
        output_path,
        progress,
    } = request;

    let sink = match &output_path {
        Some(path) => OutputSink::create_file(path).await?,
        None => OutputSink::buffer(),
    };

    let retry_client = RetryClient::new(config.client.clone(), config.retry);
    let probe = ProbeEngine::new(&retry_client);

    log_debug(&debug_sink, &format!("probing {url}"));
    let outcome = probe.probe(&url, &headers, &sink).await?;

    let (status, response_headers) = match outcome {
        ProbeOutcome::Streamed { status, headers } => {
            emit_progress(&progress, 0);
            let written = sink.len().await?;
            emit_progress(&progress, written as i64);
            (status, headers)
        }
        ProbeOutcome::WholeBody { content_length, .. } => {
            log_debug(&debug_sink, "server declared no range support, falling back to whole-body GET");
            emit_progress(&progress, content_length.unwrap_or(0) as i64);
            let (status, response_headers, written) =
                probe::fetch_whole_body(&retry_client, &url, &headers, &sink).await?;
            emit_progress(&progress, written as i64);
            debug!(?response_headers, "whole-body fallback complete");
            (status, response_headers)
        }
        ProbeOutcome::Ranged {
            status,
            headers: response_headers,
            content_length,
        } => {
            emit_progress(&progress, content_length as i64);
            log_debug(
                &debug_sink,
                &format!("server supports ranges, content length {content_length}"),
            );

            let descriptors = ChunkPlanner::plan(content_length, config.chunks, config.chunk_size);
            let effective_chunks =
                ChunkPlanner::effective_chunks(content_length, config.chunks, config.chunk_size);
            let concurrency = config.semaphore_capacity(effective_chunks);

            pool::run(
                descriptors,
                url.clone(),
                headers.clone(),
                retry_client.clone(),
                sink.clone(),
                concurrency,
                progress.clone(),
            )
            .await?;

            let actual = sink.len().await?;
            if actual != content_length {
                return Err(RangeTripperError::ContentLengthMismatch {
                    expected: content_length,
                    actual,
                });
            }

            (status, response_headers)
        }
    };

    let body = match output_path {
        Some(path) => Body::File(path),
        None => Body::Bytes(sink.into_bytes().expect("a non-file sink is always a buffer")),
    };

    if let Some(timing) = &timing_sink {
        timing(started.elapsed());
    }

    Ok(Response {
        status,
        headers: response_headers,
        body,
    })
}

fn emit_progress(progress: &Option<crate::request::ProgressSender>, value: i64) {
    if let Some(sender) = progress {
        let _ = sender.try_send(value);
    }
}

fn log_debug(sink: &Option<DebugSink>, message: &str) {
    debug!("{message}");
    if let Some(sink) = sink {
        sink(message);
    }
}
