//! Transport agnostic sending of seekable resources.
//!
//! [`send_seekable`] plans the response, seeks the source, and only then
//! touches the [`ResponseSink`]. Any error it returns was raised before the
//! status or a single header was set, so the caller can still answer with
//! an error response of its own.

use std::io;
use std::pin::pin;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::RangeError;
use crate::file::KnownSize;
use crate::plan::{plan_response, ResponsePlan};
use crate::stream::RangedStream;
use crate::{seek_start, RangeBody};

/// The response half of a transport.
///
/// Headers set here are committed by the first write to the body.
pub trait ResponseSink: AsyncWrite + Unpin {
    fn set_status(&mut self, status: StatusCode);

    /// Sets `name`, replacing any previous value.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);
}

/// Sends `body` to `sink`, honouring an optional raw `Range` header.
///
/// Errors raised while copying the body are logged and discarded: at that
/// point the headers are out and the peer most likely went away.
pub async fn send_seekable<W, B>(sink: &mut W, range: Option<&str>, body: B) -> Result<(), RangeError>
where
    W: ResponseSink + ?Sized,
    B: RangeBody,
{
    let plan = plan_response(range, body.byte_size())?;
    let content_type = body.content_type();

    let mut body = pin!(body);
    seek_start(body.as_mut(), plan.start()).await.inspect_err(|err| {
        warn!(start = plan.start(), %err, "failed to seek resource");
    })?;

    write_head(sink, &plan);
    if let Some(content_type) = content_type {
        if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
            sink.set_header(CONTENT_TYPE, value);
        }
    }

    let stream = RangedStream::new(body, plan.content_length());
    match copy_stream(stream, sink).await {
        Ok(written) => debug!(written, "response sent"),
        Err(err) => debug!(%err, "discarding error after headers were sent"),
    }

    Ok(())
}

/// Same as [`send_seekable`], taking the resource length from the file's
/// metadata. A failed stat is reported as [`RangeError::Io`].
pub async fn send_seekable_file<W>(
    sink: &mut W,
    range: Option<&str>,
    file: tokio::fs::File,
) -> Result<(), RangeError>
where
    W: ResponseSink + ?Sized,
{
    let body = KnownSize::file(file).await.inspect_err(|err| {
        warn!(%err, "failed to stat resource");
    })?;
    send_seekable(sink, range, body).await
}

fn write_head<W: ResponseSink + ?Sized>(sink: &mut W, plan: &ResponsePlan) {
    sink.set_status(plan.status());
    for (name, value) in plan.headers().iter() {
        sink.set_header(name.clone(), value.clone());
    }
}

async fn copy_stream<B, W>(stream: RangedStream<B>, sink: &mut W) -> io::Result<u64>
where
    B: tokio::io::AsyncRead,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut stream = pin!(stream);
    let mut written = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        sink.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    sink.flush().await?;
    Ok(written)
}
