//! # Security Module
//!
//! Authentication strategies consulted by a [`Resource`](crate::dispatcher::Resource)
//! before anything else in the dispatch pipeline runs.
//!
//! ## Overview
//!
//! An [`AuthenticationStrategy`] answers two questions:
//!
//! - does this request carry credentials the strategy accepts?
//! - what response challenges a caller that failed?
//!
//! Strategies are immutable once the resource is built and are shared by every
//! request. The [`chain`] module runs the configured strategies in order and
//! decides which handler serves the request.
//!
//! ## Example Strategies
//!
//! The dispatch core only needs the trait and [`NoAuthentication`], the default
//! when a resource is built without strategies. The other providers below are
//! example strategies: small reference implementations of common credential
//! checks, not a protocol layer. Hosts with real identity providers implement
//! [`AuthenticationStrategy`] themselves.
//!
//! | provider | credentials | challenge |
//! |----------|-------------|-----------|
//! | [`NoAuthentication`] | none, always authenticated | never used |
//! | [`HttpBasicAuthentication`] | `Authorization: Basic ...` checked by a verifier | 401 + `WWW-Authenticate: Basic realm="..."` |
//! | [`ApiKeyAuthentication`] | header, query parameter or cookie | 401 |
//! | [`BearerJwtAuthentication`] | `Authorization: Bearer ...` or cookie | 401 + `WWW-Authenticate: Bearer` |
//!
//! ## Custom Strategies
//!
//! ```rust
//! use brrtresource::dispatcher::HandlerResponse;
//! use brrtresource::security::{AuthenticationStrategy, SecurityRequest};
//!
//! struct InternalNetwork;
//!
//! impl AuthenticationStrategy for InternalNetwork {
//!     fn is_authenticated(&self, req: &SecurityRequest) -> bool {
//!         req.get_header("x-internal-caller").is_some()
//!     }
//!
//!     fn challenge(&self) -> HandlerResponse {
//!         HandlerResponse::text(403, "internal callers only")
//!     }
//! }
//! ```

use crate::dispatcher::{HandlerResponse, HeaderVec, ParamVec};

pub mod chain;

mod api_key;
mod basic;
mod bearer_jwt;
mod no_auth;

pub use api_key::{ApiKeyAuthentication, ApiKeyLocation};
pub use basic::{CredentialVerifier, HttpBasicAuthentication};
pub use bearer_jwt::BearerJwtAuthentication;
pub use chain::{authenticate, AuthOutcome};
pub use no_auth::NoAuthentication;

/// Credential view of a request handed to authentication strategies.
///
/// Borrows the request's header, query and cookie blocks; nothing is copied.
#[derive(Debug, Clone, Copy)]
pub struct SecurityRequest<'a> {
    /// HTTP headers
    pub headers: &'a HeaderVec,
    /// Query string parameters
    pub query: &'a ParamVec,
    /// Cookies parsed from the Cookie header
    pub cookies: &'a HeaderVec,
}

impl<'a> SecurityRequest<'a> {
    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name
    #[inline]
    #[must_use]
    pub fn get_query(&self, name: &str) -> Option<&'a str> {
        self.query
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&'a str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A way of recognising authenticated callers.
///
/// Implementations must be cheap to share; `is_authenticated` may perform
/// credential lookups but must not keep per-request state.
pub trait AuthenticationStrategy: Send + Sync {
    /// Whether the request carries credentials this strategy accepts.
    fn is_authenticated(&self, req: &SecurityRequest) -> bool;

    /// Response sent to callers no strategy authenticated.
    fn challenge(&self) -> HandlerResponse;

    /// Short name used in log lines.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("strategy")
    }
}

/// Body of every built-in 401 challenge.
pub const AUTHORIZATION_REQUIRED: &str = "Authorization Required";
