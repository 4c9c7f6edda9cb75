//! # brrtresource
//!
//! **brrtresource** turns a plain data handler (an object exposing CRUD-style
//! operations) into an HTTP resource. It authenticates the caller, picks and
//! invokes the matching handler operation, serializes the result through a
//! content-negotiated emitter and overlays item-range paging on collection
//! results.
//!
//! The crate does not own a socket. A host transport (a `may_minihttp`
//! service, a hyper service, a test harness) builds a
//! [`HandlerRequest`](dispatcher::HandlerRequest), calls
//! [`Resource::handle`](dispatcher::Resource::handle) and writes the returned
//! [`HandlerResponse`](dispatcher::HandlerResponse).
//!
//! ## Architecture
//!
//! - **[`dispatcher`]** - the per-request pipeline, method resolution and fault classification
//! - **[`security`]** - the strategy trait, the authenticator chain and a few example strategies
//! - **[`handler`]** - the `Handler` trait and its capability descriptor
//! - **[`range`]** - `items=` range headers, offset/limit paging and range resolution
//! - **[`collection`]** - lazy queryable collections (count + windowed slice)
//! - **[`emitter`]** - output formats (`json`, `yaml`, custom) and field projection
//! - **[`mime`]** - request body decoding
//! - **[`reporter`]** - crash reports for unhandled faults
//! - **[`config`]** - `ResourceConfig` from defaults, environment or YAML
//! - **[`logging`]** - `tracing-subscriber` setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host transport
//!     participant Resource
//!     participant Chain as Authenticator chain
//!     participant Decoder as Body decoder
//!     participant Handler
//!     participant Emitter
//!
//!     Host->>Resource: handle(request, route_args)
//!     Resource->>Chain: authenticate(request, verb)
//!     alt No strategy and no anonymous variant
//!         Chain-->>Host: challenge (401)
//!     end
//!     Resource->>Decoder: decode body (POST/PUT)
//!     alt Undecodable
//!         Resource-->>Host: 400 Bad Request
//!     end
//!     Resource->>Resource: resolve verb → read/create/update/delete
//!     Resource->>Handler: invoke(method, sanitized request)
//!     Handler-->>Resource: value / collection / response / fault
//!     Resource->>Resource: count + slice collection (206 / 416)
//!     Resource->>Emitter: render or stream_render
//!     Resource-->>Host: response + Vary: Authorization
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use brrtresource::dispatcher::{HandlerRequest, Resource};
//! use brrtresource::handler::{
//!     CrudMethod, Handler, HandlerCapabilities, HandlerOutput, HandlerResult, RouteArgs,
//! };
//! use http::Method;
//! use serde_json::json;
//!
//! struct Hello {
//!     caps: HandlerCapabilities,
//! }
//!
//! impl Handler for Hello {
//!     fn capabilities(&self) -> &HandlerCapabilities {
//!         &self.caps
//!     }
//!
//!     fn read(&self, _req: &HandlerRequest, _args: &RouteArgs) -> HandlerResult {
//!         Ok(HandlerOutput::Value(json!({ "hello": "world" })))
//!     }
//! }
//!
//! let resource = Resource::new(Arc::new(Hello {
//!     caps: HandlerCapabilities::new().implement(&[CrudMethod::Read]),
//! }));
//! let resp = resource
//!     .handle(HandlerRequest::new(Method::GET, "/hello"), RouteArgs::new())
//!     .unwrap();
//! assert_eq!(resp.status, 200);
//! assert_eq!(resp.body.into_bytes(), br#"{"hello":"world"}"#.to_vec());
//! ```
//!
//! ## Runtime Considerations
//!
//! Dispatch is synchronous and never blocks on anything but the handler and
//! its collection. That makes a `Resource` equally usable from OS threads and
//! from `may` coroutines; share it behind an `Arc`.

pub mod collection;
pub mod config;
pub mod dispatcher;
pub mod emitter;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod mime;
pub mod range;
pub mod reporter;
pub mod security;

pub use config::ResourceConfig;
pub use dispatcher::{DispatchError, HandlerRequest, HandlerResponse, Resource, ResourceBuilder};
pub use handler::{CrudMethod, Handler, HandlerCapabilities, HandlerFault, HandlerOutput};
pub use security::{AuthOutcome, AuthenticationStrategy, SecurityRequest};
