//! # Range Module
//!
//! Item-level partial GET for collection results. This follows HTTP/1.1 partial
//! content (RFC 2616 sec 14.35) but counts records rather than bytes: a client asks
//! for a window of items and receives `206 Partial Content` with a
//! `Content-Range: items {start}-{end}/{total}` header.
//!
//! ## Request Styles
//!
//! Two request styles feed the same resolver:
//!
//! - **Range header**: `Range: items=7-45`. Either side may be left empty
//!   (`items=7-` for "from item 7 on", `items=-10` for "the last 10 items").
//! - **Paging query parameters**: `?offset=10&limit=5`. Both keys must be present
//!   but either value may be empty:
//!   - `?offset=n&limit=` -> tail of the list beginning at item `n`
//!   - `?offset=&limit=n` -> trailing `n` items of the list
//!
//! When a request carries both, the header wins.
//!
//! ## Resolution
//!
//! [`resolve_range`] validates the requested bounds against the collection size and
//! clamps the end to the last item. The result is always an inclusive pair inside
//! `0..=total-1`.
//!
//! ```rust
//! use brrtresource::range::{resolve_range, ResolvedRange};
//!
//! assert_eq!(
//!     resolve_range(Some(7), Some(150), 100),
//!     Ok(ResolvedRange { start: 7, end: 99, total: 100 })
//! );
//! assert_eq!(resolve_range(None, Some(10), 50).map(|r| r.start), Ok(40));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::num::IntErrorKind;

use crate::dispatcher::ParamVec;

/// Unit name used in the `Range` request header and `Content-Range` response header.
pub const RANGE_UNIT: &str = "items";

static ITEMS_RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^items=(\d*)-(\d*)$").expect("items range regex is valid")
});

/// A requested window of items, before it is checked against the collection size.
///
/// Bounds are signed so that negative values coming from query parameters can be
/// rejected by [`resolve_range`] instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeRequest {
    /// First requested item (inclusive)
    pub start: Option<i64>,
    /// Last requested item (inclusive), or the tail length when `start` is absent
    pub end: Option<i64>,
}

impl RangeRequest {
    #[must_use]
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// Resolve this request against a collection of `total` items.
    pub fn resolve(&self, total: u64) -> Result<ResolvedRange, RangeError> {
        resolve_range(self.start, self.end, total)
    }
}

/// A validated, clamped, inclusive item window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    /// Size of the whole collection the window was taken from
    pub total: u64,
}

impl ResolvedRange {
    /// Number of items inside the window.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A resolved range always holds at least one item.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the `Content-Range` response header.
    #[must_use]
    pub fn content_range(&self) -> String {
        format!("{RANGE_UNIT} {}-{}/{}", self.start, self.end, self.total)
    }
}

impl fmt::Display for ResolvedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}/{}", self.start, self.end, self.total)
    }
}

/// Reason a requested range cannot be satisfied.
///
/// The `Display` text is written into the body of the 416 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// A bound was given as a negative number
    NegativeRange,
    /// The start lies past the last item
    StartBeyondLast,
    /// The start lies after the end
    StartAfterEnd,
    /// Neither bound was supplied
    NoBounds,
    /// The collection has no items to take a window from
    EmptyCollection,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RangeError::NegativeRange => "negative ranges not allowed",
            RangeError::StartBeyondLast => "start beyond last item",
            RangeError::StartAfterEnd => "start after end",
            RangeError::NoBounds => "no start or end supplied",
            RangeError::EmptyCollection => "collection is empty",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for RangeError {}

/// A `Range: items=...` header that does not follow `items=<start>-<end>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRange {
    pub header: String,
}

impl fmt::Display for MalformedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed range header '{}'", self.header)
    }
}

impl std::error::Error for MalformedRange {}

/// Normalise a requested range for slicing and header generation.
///
/// Rules, applied in order:
///
/// 1. A negative `start` or `end` fails.
/// 2. Both given: `start` must not pass the last item nor the end; an end past the
///    last item is clamped to it.
/// 3. Only `start`: it must not pass the last item; the window runs to the end.
/// 4. Only `end`: the last `end` items, or the whole collection if `end` exceeds it.
///    A tail of zero items would start past the last item and fails.
/// 5. Neither: fails.
pub fn resolve_range(
    start: Option<i64>,
    end: Option<i64>,
    total: u64,
) -> Result<ResolvedRange, RangeError> {
    if start.is_some_and(|s| s < 0) || end.is_some_and(|e| e < 0) {
        return Err(RangeError::NegativeRange);
    }
    // Sign checked above, so the casts below are lossless
    let start = start.map(|s| s as u64);
    let end = end.map(|e| e as u64);

    if start.is_none() && end.is_none() {
        return Err(RangeError::NoBounds);
    }
    if total == 0 {
        return Err(match start {
            Some(_) => RangeError::StartBeyondLast,
            None => RangeError::EmptyCollection,
        });
    }
    let last = total - 1;

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => {
            if start > last {
                return Err(RangeError::StartBeyondLast);
            }
            if start > end {
                return Err(RangeError::StartAfterEnd);
            }
            (start, end.min(last))
        }
        (Some(start), None) => {
            if start > last {
                return Err(RangeError::StartBeyondLast);
            }
            (start, last)
        }
        (None, Some(0)) => return Err(RangeError::StartBeyondLast),
        (None, Some(tail)) => {
            if tail > last {
                (0, last)
            } else {
                (total - tail, last)
            }
        }
        (None, None) => return Err(RangeError::NoBounds),
    };

    Ok(ResolvedRange { start, end, total })
}

/// Parse a `Range` header value.
///
/// Returns `Ok(None)` for headers in another unit (e.g. `bytes=0-99`), which this
/// layer leaves alone, and `Err` for an `items=` header it cannot read.
pub fn parse_range_header(value: &str) -> Result<Option<RangeRequest>, MalformedRange> {
    let value = value.trim();
    if !value.starts_with("items=") {
        return Ok(None);
    }
    let malformed = || MalformedRange {
        header: value.to_string(),
    };
    let caps = ITEMS_RANGE_REGEX.captures(value).ok_or_else(malformed)?;
    let bound = |idx: usize| -> Result<Option<i64>, MalformedRange> {
        match caps.get(idx).map(|m| m.as_str()) {
            None | Some("") => Ok(None),
            // Digit runs too long for i64 saturate, so they resolve as out of range
            Some(digits) => match digits.parse::<i64>() {
                Ok(n) => Ok(Some(n)),
                Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(Some(i64::MAX)),
                Err(_) => Err(malformed()),
            },
        }
    };
    Ok(Some(RangeRequest::new(bound(1)?, bound(2)?)))
}

/// Translate paging query parameters into a range request.
///
/// Both keys must be present. A value that is empty or not an integer counts as
/// absent, so `offset=10&limit=` means "from item 10 on".
#[must_use]
pub fn range_from_paging(query: &ParamVec, offset_key: &str, limit_key: &str) -> Option<RangeRequest> {
    let lookup = |key: &str| {
        query
            .iter()
            .rfind(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_str())
    };
    let offset_raw = lookup(offset_key)?;
    let limit_raw = lookup(limit_key)?;

    let offset = offset_raw.trim().parse::<i64>().ok();
    let limit = limit_raw.trim().parse::<i64>().ok();

    match (offset, limit) {
        (Some(offset), Some(limit)) => Some(RangeRequest::new(
            Some(offset),
            Some(offset.saturating_add(limit).saturating_sub(1)),
        )),
        (Some(offset), None) => Some(RangeRequest::new(Some(offset), None)),
        (None, Some(limit)) => Some(RangeRequest::new(None, Some(limit))),
        (None, None) => None,
    }
}
