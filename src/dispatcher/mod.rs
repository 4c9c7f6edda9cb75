//! # Dispatcher Module
//!
//! The dispatcher turns one inbound request into one response for a
//! [`Resource`], i.e. a [`Handler`](crate::handler::Handler) bound to its
//! authentication strategies, emitters and configuration.
//!
//! ## Request Flow
//!
//! 1. PUT bodies are coerced into the PUT parameter block
//! 2. The authenticator chain picks the serving handler or answers with a challenge
//! 3. POST/PUT bodies are decoded into `request.data` (undecodable → 400)
//! 4. The verb is resolved to a CRUD operation (405 / 404 on failure)
//! 5. The output format is chosen: route argument, then `?format=`, then the default
//! 6. `oauth_*` parameters are stripped from every parameter block
//! 7. The operation runs; faults go through the [`errors`] classifier
//! 8. The emitter is resolved (unknown format → 400) and the field projection chosen
//! 9. Lazy collections are counted, range-resolved and sliced (416 on a bad range)
//! 10. The result is emitted, buffered or streamed
//! 11. Status is 200, the handler's own status, or 206 with `Content-Range`
//!
//! Every response carries `Vary: Authorization`.
//!
//! ## Error Handling
//!
//! Handler panics are caught and treated like any other unhandled fault:
//! reported when `email_errors` is on, answered with a 500 when
//! `display_errors` is on, otherwise returned as [`DispatchError`].
//!
//! ## Concurrency
//!
//! [`Resource::handle`] takes `&self` and keeps all per-request state local, so
//! a single `Arc<Resource>` can serve threads and `may` coroutines alike.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use brrtresource::collection::VecCollection;
//! use brrtresource::dispatcher::{HandlerRequest, Resource};
//! use brrtresource::handler::{
//!     CrudMethod, Handler, HandlerCapabilities, HandlerOutput, HandlerResult, RouteArgs,
//! };
//! use http::Method;
//! use serde_json::json;
//!
//! struct Numbers(HandlerCapabilities);
//!
//! impl Handler for Numbers {
//!     fn capabilities(&self) -> &HandlerCapabilities {
//!         &self.0
//!     }
//!
//!     fn read(&self, _req: &HandlerRequest, _args: &RouteArgs) -> HandlerResult {
//!         let items = (0..100).map(|i| json!({ "n": i })).collect();
//!         Ok(HandlerOutput::Collection(Box::new(VecCollection::new(items))))
//!     }
//! }
//!
//! let handler = Numbers(HandlerCapabilities::new().implement(&[CrudMethod::Read]));
//! let resource = Resource::new(Arc::new(handler));
//! let req = HandlerRequest::new(Method::GET, "/numbers?offset=10&limit=5");
//! let resp = resource.handle(req, RouteArgs::new()).unwrap();
//! assert_eq!(resp.status, 206);
//! assert_eq!(resp.get_header("content-range"), Some("items 10-14/100"));
//! ```

mod core;
pub mod errors;
pub mod method;

pub use self::core::{
    BodyStream, DispatchError, HandlerRequest, HandlerResponse, HeaderVec, ParamBlocks, ParamVec,
    Resource, ResourceBuilder, ResponseBody, FORMAT_QUERY_PARAM, MAX_INLINE_HEADERS,
    MAX_INLINE_PARAMS, OAUTH_PARAM_PREFIX,
};
pub use errors::{classify_fault, format_error, Classified};
pub use method::{resolve_method, CrudMethod, MethodError, MethodOverrides};
