use std::{io, mem};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{Response, IntoResponse};
use bytes::{Bytes, BytesMut};
use http_body::{Body, SizeHint, Frame};
use futures::Stream;
use pin_project::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Response body stream. Implements [`Stream`], [`Body`], and [`IntoResponse`].
///
/// Reads exactly `length` bytes from a source that has already been seeked
/// to the start of the requested span. A source that ends early ends the
/// stream early.
#[pin_project]
pub struct RangedStream<B> {
    state: StreamState,
    length: u64,
    #[pin]
    body: B,
}

impl<B: AsyncRead> RangedStream<B> {
    pub(crate) fn new(body: B, length: u64) -> Self {
        RangedStream {
            state: StreamState::Reading { buffer: allocate_buffer(), remaining: length },
            length,
            body,
        }
    }
}

#[derive(Debug)]
enum StreamState {
    Reading { buffer: BytesMut, remaining: u64 },
    Done,
}

impl<B> std::fmt::Debug for RangedStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedStream")
            .field("length", &self.length)
            .field("state", &self.state)
            .finish()
    }
}

impl<B: AsyncRead + Send + 'static> IntoResponse for RangedStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: AsyncRead> Body for RangedStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: AsyncRead> Stream for RangedStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<io::Result<Bytes>>> {
        let this = self.project();

        let StreamState::Reading { buffer, remaining } = this.state else {
            return Poll::Ready(None);
        };

        if *remaining == 0 {
            *this.state = StreamState::Done;
            return Poll::Ready(None);
        }

        let uninit = buffer.spare_capacity_mut();

        // calculate max number of bytes to read in this iteration, the
        // smaller of the buffer size and the number of bytes remaining
        let nbytes = std::cmp::min(
            uninit.len(),
            usize::try_from(*remaining).unwrap_or(usize::MAX),
        );

        let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

        match this.body.poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => {
                *this.state = StreamState::Done;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Ok(())) => {
                match read_buf.filled().len() {
                    0 => {
                        *this.state = StreamState::Done;
                        Poll::Ready(None)
                    }
                    n => {
                        // SAFETY: poll_read has filled the buffer with `n`
                        // additional bytes. `buffer.len` is always 0 here
                        unsafe { buffer.set_len(buffer.len() + n); }

                        let chunk = mem::replace(buffer, allocate_buffer());

                        // n <= remaining because of the cmp::min above
                        *remaining -= n as u64;

                        Poll::Ready(Some(Ok(chunk.freeze())))
                    }
                }
            }
        }
    }
}

fn allocate_buffer() -> BytesMut {
    BytesMut::with_capacity(IO_BUFFER_SIZE)
}
