//! Request ids.
//!
//! Every [`HandlerRequest`](crate::dispatcher::HandlerRequest) carries a
//! [`RequestId`]. It is minted when the request is built, or adopted from an
//! inbound `x-request-id` header so a dispatch can be followed across proxies.
//! The id then shows up as the `request_id` field on every log line of the
//! dispatch, in each [`CrashReport`](crate::reporter::CrashReport), and in
//! [`DispatchError::Unhandled`](crate::dispatcher::DispatchError) so the host
//! can tie a propagated fault back to its logs.
//!
//! ULIDs sort by creation time, which keeps reports from one burst of traffic
//! together when listed.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Header a host or proxy uses to pass an existing request id along.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub Ulid);

impl RequestId {
    /// Fresh id for a request that arrived without one.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Adopt the inbound header value when it is a ULID; anything else (absent,
    /// empty, a UUID from another system) gets a fresh id.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Milliseconds since the Unix epoch at which the id was minted.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(RequestId)
    }
}

// Crash reports serialise the id as its 26 character text form.
impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
