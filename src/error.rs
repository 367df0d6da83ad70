use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure to parse a raw `Range` header value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Missing `=` or `-`, empty range token, or a bound that is not a number.
    #[error("invalid range header")]
    InvalidSyntax,

    /// Both bounds were present but the end came before the start. A
    /// negative end always does.
    #[error("invalid range: end is smaller than start")]
    EndBeforeStart { start: u64, end: i64 },
}

/// Every way a seekable response can fail before its headers are committed.
///
/// All variants except [`RangeError::Io`] are caused by the request and map
/// to `400 Bad Request`. Adapters should branch on the variant (or on
/// [`RangeError::status`]), not on the message text.
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("invalid range header")]
    InvalidRangeHeader,

    #[error("invalid range: end is smaller than start")]
    EndBeforeStart { start: u64, end: i64 },

    #[error("only range unit \"bytes\" is supported")]
    UnsupportedRangeUnit(String),

    /// Zero or several comma separated ranges were requested.
    #[error("only single ranges are supported")]
    MultipleRangesUnsupported(usize),

    #[error("range is out of bounds")]
    RangeOutOfBounds { start: u64, end: u64, length: u64 },

    /// Stat or seek on the underlying resource failed. The message shown to
    /// clients never includes the source error.
    #[error("internal server error")]
    Io(#[source] io::Error),
}

impl RangeError {
    /// HTTP status an adapter should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            RangeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// True for failures caused by the request rather than the resource.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl From<ParseError> for RangeError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidSyntax => RangeError::InvalidRangeHeader,
            ParseError::EndBeforeStart { start, end } => RangeError::EndBeforeStart { start, end },
        }
    }
}

impl From<io::Error> for RangeError {
    fn from(err: io::Error) -> Self {
        RangeError::Io(err)
    }
}

/// Renders the status with a short plain text body.
impl IntoResponse for RangeError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
