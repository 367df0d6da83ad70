//! # axum-seekable
//!
//! Single byte-range HTTP responses over seekable sources, for [`axum`][1]
//! or any other transport.
//!
//! A request's `Range` header is parsed, checked against the resource length
//! and answered with either `200 OK` and the whole resource, or
//! `206 Partial Content` with a `Content-Range` for exactly the requested
//! span. Only the `bytes` unit and a single `first-last` or `first-` range
//! are served; anything else is rejected with `400 Bad Request` before the
//! source is touched. Out of bounds ranges are rejected, never clamped.
//!
//! The source is seeked before any header is produced, so every
//! [`RangeError`] can still be turned into a clean error response. Once the
//! body is streaming, copy errors are not reported.
//!
//! Any type implementing both [`AsyncRead`] and [`AsyncSeekStart`] can be
//! used with the [`KnownSize`] adapter struct. There is also special cased
//! support for [`tokio::fs::File`], see [`KnownSize::file`] and
//! [`KnownSize::open`].
//!
//! ```no_run
//! use axum::Router;
//! use axum::response::Response;
//! use axum::routing::get;
//!
//! use axum_seekable::{KnownSize, RawRange, Seekable};
//!
//! async fn file(RawRange(range): RawRange) -> Response {
//!     match KnownSize::open("document.txt").await {
//!         Ok(body) => Seekable::new(range, body).respond().await,
//!         Err(err) => axum_seekable::RangeError::Io(err).into_response(),
//!     }
//! }
//!
//! # use axum::response::IntoResponse;
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::<()>::new().route("/", get(file));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! For transports other than axum, implement [`ResponseSink`] and call
//! [`send_seekable`].
//!
//! [1]: https://docs.rs/axum

mod error;
mod file;
mod parser;
mod plan;
mod send;
mod stream;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::FromRequestParts;
use axum::http::header::RANGE;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{ContentType, HeaderMapExt};
use mime_guess::Mime;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::warn;

pub use error::{ParseError, RangeError};
pub use file::KnownSize;
pub use parser::{parse_range_header, ByteRange, RangeHeader};
pub use plan::{plan_response, ResolvedSpan, ResponsePlan, UNIT_BYTES};
pub use send::{send_seekable, send_seekable_file, ResponseSink};
pub use stream::RangedStream;

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait RangeBody: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying resource.
    ///
    /// This should not change for the lifetime of the object once queried.
    /// Behaviour is not guaranteed if it does change.
    fn byte_size(&self) -> u64;

    /// Media type of the resource, if known.
    fn content_type(&self) -> Option<Mime> {
        None
    }
}

/// Seeks `body` to `position`, waiting for any seek already in flight first.
pub(crate) async fn seek_start<B: AsyncSeekStart + ?Sized>(mut body: Pin<&mut B>, position: u64) -> io::Result<()> {
    std::future::poll_fn(|cx| body.as_mut().poll_complete(cx)).await?;
    body.as_mut().start_seek(position)?;
    std::future::poll_fn(|cx| body.as_mut().poll_complete(cx)).await
}

/// Extracts the raw `Range` request header, if any.
///
/// A header value that is not visible ASCII is rejected with
/// [`RangeError::InvalidRangeHeader`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRange(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for RawRange {
    type Rejection = RangeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(RANGE) {
            None => Ok(RawRange(None)),
            Some(value) => value
                .to_str()
                .map(|range| RawRange(Some(range.to_string())))
                .map_err(|_| RangeError::InvalidRangeHeader),
        }
    }
}

/// The axum responder: a raw `Range` header and a body to serve it from.
#[derive(Debug)]
pub struct Seekable<B: RangeBody + Unpin + Send + 'static> {
    range: Option<String>,
    body: B,
    content_type: Option<Mime>,
}

impl<B: RangeBody + Unpin + Send + 'static> Seekable<B> {
    /// Construct a response over any type implementing [`RangeBody`] and an
    /// optional raw `Range` header value.
    pub fn new(range: Option<String>, body: B) -> Self {
        Seekable { range, body, content_type: None }
    }

    /// Overrides the content type reported by the body.
    pub fn with_content_type(mut self, content_type: Mime) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Plans the response and seeks the body to the start of the span.
    ///
    /// On error nothing has been sent yet; [`RangeError`] implements
    /// [`IntoResponse`].
    pub async fn try_respond(self) -> Result<SeekableResponse<B>, RangeError> {
        let Seekable { range, mut body, content_type } = self;

        let plan = plan_response(range.as_deref(), body.byte_size())?;
        let content_type = content_type.or_else(|| body.content_type());

        seek_start(Pin::new(&mut body), plan.start()).await.inspect_err(|err| {
            warn!(start = plan.start(), %err, "failed to seek resource");
        })?;

        let stream = RangedStream::new(body, plan.content_length());
        Ok(SeekableResponse { plan, content_type, stream })
    }

    /// [`Seekable::try_respond`], with errors rendered as responses.
    pub async fn respond(self) -> Response {
        self.try_respond().await.into_response()
    }
}

/// A planned response with its body already positioned. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct SeekableResponse<B> {
    plan: ResponsePlan,
    content_type: Option<Mime>,
    stream: RangedStream<B>,
}

impl<B> SeekableResponse<B> {
    pub fn plan(&self) -> &ResponsePlan {
        &self.plan
    }

    pub fn into_stream(self) -> RangedStream<B> {
        self.stream
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for SeekableResponse<B> {
    fn into_response(self) -> Response {
        let mut headers = self.plan.headers();
        let content_type = self.content_type
            .map(ContentType::from)
            .unwrap_or_else(ContentType::octet_stream);
        headers.typed_insert(content_type);

        (self.plan.status(), headers, self.stream).into_response()
    }
}
