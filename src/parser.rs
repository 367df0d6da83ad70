//! Parser for the `Range` request header.
//!
//! Only the `first-last` and `first-` forms of a byte range spec are
//! understood. Suffix ranges (`-500`) have no first position and are rejected
//! as invalid syntax, as is anything else that does not split cleanly.

use crate::error::ParseError;

/// A parsed `Range` header: the unit token and the ranges in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeHeader {
    pub unit: String,
    pub ranges: Vec<ByteRange>,
}

/// One requested range. `end` is inclusive; `None` means the range runs to
/// the end of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        ByteRange { start, end }
    }
}

/// Parses a raw `Range` header value such as `bytes=0-499`.
///
/// The unit is not checked here. Whitespace is trimmed around each comma
/// separated token, but not around the `-` inside a token.
pub fn parse_range_header(header: &str) -> Result<RangeHeader, ParseError> {
    let (unit, spec) = header.split_once('=').ok_or(ParseError::InvalidSyntax)?;

    let ranges = spec
        .split(',')
        .map(parse_range_token)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RangeHeader { unit: unit.to_string(), ranges })
}

fn parse_range_token(token: &str) -> Result<ByteRange, ParseError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ParseError::InvalidSyntax);
    }

    let (start, end) = token.split_once('-').ok_or(ParseError::InvalidSyntax)?;
    // the start text never carries a sign once split at the first `-`
    let start = u64::try_from(parse_position(start)?).map_err(|_| ParseError::InvalidSyntax)?;

    if end.is_empty() {
        return Ok(ByteRange::new(start, None));
    }

    // a negative end is a well formed number that lies before any start
    let end = parse_position(end)?;
    match u64::try_from(end) {
        Ok(end) if end >= start => Ok(ByteRange::new(start, Some(end))),
        _ => Err(ParseError::EndBeforeStart { start, end }),
    }
}

/// Positions are signed 64-bit decimals; anything wider is invalid syntax.
fn parse_position(text: &str) -> Result<i64, ParseError> {
    text.parse::<i64>().map_err(|_| ParseError::InvalidSyntax)
}
