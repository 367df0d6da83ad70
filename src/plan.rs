//! Decides between a full and a partial response for one request.
//!
//! Planning is pure: it only looks at the raw header and the resource
//! length. Seeking and copying happen afterwards, see [`crate::send`] and
//! [`crate::Seekable`].

use axum::http::StatusCode;
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, HeaderMap, HeaderMapExt};
use tracing::debug;

use crate::error::RangeError;
use crate::parser::parse_range_header;

/// The only range unit this crate serves.
pub const UNIT_BYTES: &str = "bytes";

/// A requested range resolved against the resource length. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSpan {
    pub start: u64,
    pub end: u64,
    pub length: u64,
}

/// Status, headers and byte span for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePlan {
    /// `200 OK`, the whole resource from offset 0.
    Full { length: u64 },
    /// `206 Partial Content`, a single span of the resource.
    Partial { span: ResolvedSpan, complete_length: u64 },
}

impl ResponsePlan {
    pub fn status(&self) -> StatusCode {
        match self {
            ResponsePlan::Full { .. } => StatusCode::OK,
            ResponsePlan::Partial { .. } => StatusCode::PARTIAL_CONTENT,
        }
    }

    /// Number of body bytes to stream.
    pub fn content_length(&self) -> u64 {
        match self {
            ResponsePlan::Full { length } => *length,
            ResponsePlan::Partial { span, .. } => span.length,
        }
    }

    /// Offset the source has to be seeked to before streaming.
    pub fn start(&self) -> u64 {
        match self {
            ResponsePlan::Full { .. } => 0,
            ResponsePlan::Partial { span, .. } => span.start,
        }
    }

    /// The `Content-Range` header, present for partial responses only.
    pub fn content_range(&self) -> Option<ContentRange> {
        match self {
            ResponsePlan::Full { .. } => None,
            ResponsePlan::Partial { span, complete_length } => Some(
                ContentRange::bytes(span.start..=span.end, *complete_length)
                    .expect("ContentRange::bytes cannot fail for a resolved span"),
            ),
        }
    }

    /// Response headers: `Accept-Ranges`, `Content-Length` and, for partial
    /// responses, `Content-Range`.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.typed_insert(AcceptRanges::bytes());
        headers.typed_insert(ContentLength(self.content_length()));
        if let Some(content_range) = self.content_range() {
            headers.typed_insert(content_range);
        }
        headers
    }
}

/// Plans the response for an optional raw `Range` header and a resource of
/// `length` bytes. An empty header counts as absent.
pub fn plan_response(range: Option<&str>, length: u64) -> Result<ResponsePlan, RangeError> {
    let header = match range {
        Some(header) if !header.is_empty() => header,
        _ => {
            debug!(length, "no range requested, sending full content");
            return Ok(ResponsePlan::Full { length });
        }
    };

    let parsed = parse_range_header(header).inspect_err(|err| {
        debug!(header, %err, "rejecting range header");
    })?;

    if parsed.unit != UNIT_BYTES {
        return Err(RangeError::UnsupportedRangeUnit(parsed.unit));
    }

    let [range] = parsed.ranges.as_slice() else {
        return Err(RangeError::MultipleRangesUnsupported(parsed.ranges.len()));
    };

    // an open ended range on an empty resource has no last byte
    let end = match range.end {
        Some(end) => end,
        None => length.checked_sub(1).ok_or(RangeError::RangeOutOfBounds {
            start: range.start,
            end: 0,
            length,
        })?,
    };

    if end >= length || range.start > end {
        return Err(RangeError::RangeOutOfBounds { start: range.start, end, length });
    }

    let span = ResolvedSpan { start: range.start, end, length: end - range.start + 1 };
    debug!(start = span.start, end = span.end, length, "sending partial content");

    Ok(ResponsePlan::Partial { span, complete_length: length })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::http::{header, HeaderValue, StatusCode};
    use axum_extra::headers::{ContentRange, Header};
    use proptest::prelude::*;

    use super::{plan_response, ResolvedSpan, ResponsePlan};
    use crate::error::RangeError;

    fn content_range_header(plan: &ResponsePlan) -> Option<String> {
        plan.headers()
            .get(header::CONTENT_RANGE)
            .map(|value| value.to_str().unwrap().to_string())
    }

    #[test]
    fn test_full_without_header() {
        for range in [None, Some("")] {
            let plan = plan_response(range, 1000).unwrap();
            assert_eq!(ResponsePlan::Full { length: 1000 }, plan);
            assert_eq!(StatusCode::OK, plan.status());
            assert_eq!(0, plan.start());

            let headers = plan.headers();
            assert_eq!(Some(&HeaderValue::from_static("bytes")), headers.get(header::ACCEPT_RANGES));
            assert_eq!(Some(&HeaderValue::from_static("1000")), headers.get(header::CONTENT_LENGTH));
            assert_eq!(None, headers.get(header::CONTENT_RANGE));
        }
    }

    #[test]
    fn test_open_ended_range() {
        let plan = plan_response(Some("bytes=500-"), 1000).unwrap();

        assert_eq!(StatusCode::PARTIAL_CONTENT, plan.status());
        assert_eq!(500, plan.content_length());
        assert_eq!(500, plan.start());
        assert_eq!(Some("bytes 500-999/1000"), content_range_header(&plan).as_deref());
        assert_eq!(
            Some(&HeaderValue::from_static("500")),
            plan.headers().get(header::CONTENT_LENGTH)
        );
        assert_eq!(
            Some(&HeaderValue::from_static("bytes")),
            plan.headers().get(header::ACCEPT_RANGES)
        );
    }

    #[test]
    fn test_bounded_range() {
        let plan = plan_response(Some("bytes=0-0"), 54).unwrap();
        assert_eq!(
            ResponsePlan::Partial {
                span: ResolvedSpan { start: 0, end: 0, length: 1 },
                complete_length: 54,
            },
            plan
        );
        assert_eq!(Some("bytes 0-0/54"), content_range_header(&plan).as_deref());

        let plan = plan_response(Some("bytes=0-53"), 54).unwrap();
        assert_eq!(StatusCode::PARTIAL_CONTENT, plan.status());
        assert_eq!(54, plan.content_length());
    }

    #[test]
    fn test_out_of_bounds_is_not_clamped() {
        assert_matches!(
            plan_response(Some("bytes=0-1000"), 1000),
            Err(RangeError::RangeOutOfBounds { start: 0, end: 1000, length: 1000 })
        );
        assert_matches!(
            plan_response(Some("bytes=1000-"), 1000),
            Err(RangeError::RangeOutOfBounds { start: 1000, end: 999, length: 1000 })
        );
        assert_matches!(
            plan_response(Some("bytes=0-"), 0),
            Err(RangeError::RangeOutOfBounds { length: 0, .. })
        );
    }

    #[test]
    fn test_rejections() {
        assert_matches!(
            plan_response(Some("items=0-10"), 100),
            Err(RangeError::UnsupportedRangeUnit(unit)) if unit == "items"
        );
        assert_matches!(
            plan_response(Some("bytes=0-10,20-30"), 100),
            Err(RangeError::MultipleRangesUnsupported(2))
        );
        assert_matches!(
            plan_response(Some("bytes=30-20"), 100),
            Err(RangeError::EndBeforeStart { start: 30, end: 20 })
        );
        assert_matches!(
            plan_response(Some("bytes=5--3"), 100),
            Err(RangeError::EndBeforeStart { start: 5, end: -3 })
        );

        let invalid = [
            "bytes=abc-10",
            "bytes=",
            "bytes=0-10,",
            "bytes",
            "bytes=-5-10",
            "bytes=0-9223372036854775808",
        ];
        for header in invalid {
            assert_matches!(
                plan_response(Some(header), 100),
                Err(RangeError::InvalidRangeHeader),
                "{header:?}"
            );
        }
    }

    #[test]
    fn test_unit_checked_before_count() {
        assert_matches!(
            plan_response(Some("items=0-1,2-3"), 100),
            Err(RangeError::UnsupportedRangeUnit(_))
        );
    }

    #[test]
    fn test_planning_is_idempotent() {
        let first = plan_response(Some("bytes=10-20"), 100).unwrap();
        let second = plan_response(Some("bytes=10-20"), 100).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.headers(), second.headers());
    }

    proptest! {
        #[test]
        fn bounded_ranges_are_served_exactly(length in 1u64..1_000_000, a in any::<u64>(), b in any::<u64>()) {
            let (a, b) = (a % length, b % length);
            let (start, end) = (a.min(b), a.max(b));

            let plan = plan_response(Some(&format!("bytes={start}-{end}")), length).unwrap();
            prop_assert_eq!(StatusCode::PARTIAL_CONTENT, plan.status());
            prop_assert_eq!(start, plan.start());
            prop_assert_eq!(end - start + 1, plan.content_length());

            // the emitted header parses back to the same numbers
            let value = plan.headers().get(axum::http::header::CONTENT_RANGE).cloned().unwrap();
            let decoded = ContentRange::decode(&mut std::iter::once(&value)).unwrap();
            prop_assert_eq!(Some((start, end)), decoded.bytes_range());
            prop_assert_eq!(Some(length), decoded.bytes_len());
        }

        #[test]
        fn open_ended_ranges_run_to_the_end(length in 1u64..1_000_000, a in any::<u64>()) {
            let start = a % length;
            let plan = plan_response(Some(&format!("bytes={start}-")), length).unwrap();
            prop_assert_eq!(
                ResponsePlan::Partial {
                    span: ResolvedSpan { start, end: length - 1, length: length - start },
                    complete_length: length,
                },
                plan
            );
        }

        #[test]
        fn ends_past_the_resource_fail(length in 0u64..1_000_000, start in 0u64..1000, over in 0u64..1000) {
            let end = length + over;
            prop_assume!(start <= end);
            let result = plan_response(Some(&format!("bytes={start}-{end}")), length);
            prop_assert!(
                matches!(result, Err(RangeError::RangeOutOfBounds { .. })),
                "expected RangeOutOfBounds, got {:?}",
                result
            );
        }

        #[test]
        fn inverted_ranges_fail(start in 0u64..i64::MAX as u64, gap in 1i64..1000) {
            // gaps reaching below zero produce a negative end
            let end = start as i64 - gap;
            let result = plan_response(Some(&format!("bytes={start}-{end}")), u64::MAX);
            prop_assert!(
                matches!(result, Err(RangeError::EndBeforeStart { .. })),
                "expected EndBeforeStart, got {:?}",
                result
            );
        }
    }
}
