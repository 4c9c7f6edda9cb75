//! # Handler Module
//!
//! A [`Handler`] is the plain data object a [`Resource`](crate::dispatcher::Resource)
//! turns into an HTTP endpoint. It exposes up to four CRUD operations
//! (`read`, `create`, `update`, `delete`) plus a [`HandlerCapabilities`] descriptor
//! that the resource reads once at registration time:
//!
//! - which HTTP verbs the handler accepts
//! - which CRUD operations it actually implements
//! - the field projection for single items and, optionally, for collections
//! - whether the handler serves anonymous callers
//! - the expected call signature of each operation (used in 400 responses)
//!
//! Handlers are shared across requests and must be `Send + Sync`; anything a
//! handler needs per request arrives through the [`HandlerRequest`] argument.
//!
//! ## Example
//!
//! ```rust
//! use brrtresource::dispatcher::HandlerRequest;
//! use brrtresource::handler::{
//!     CrudMethod, Handler, HandlerCapabilities, HandlerOutput, HandlerResult, RouteArgs,
//! };
//! use http::Method;
//! use serde_json::json;
//!
//! struct PetHandler {
//!     caps: HandlerCapabilities,
//! }
//!
//! impl PetHandler {
//!     fn new() -> Self {
//!         Self {
//!             caps: HandlerCapabilities::new()
//!                 .allow(&[Method::GET])
//!                 .implement(&[CrudMethod::Read])
//!                 .fields(&["id", "name"]),
//!         }
//!     }
//! }
//!
//! impl Handler for PetHandler {
//!     fn capabilities(&self) -> &HandlerCapabilities {
//!         &self.caps
//!     }
//!
//!     fn read(&self, _req: &HandlerRequest, _args: &RouteArgs) -> HandlerResult {
//!         Ok(HandlerOutput::Value(json!({ "id": 1, "name": "Rex" })))
//!     }
//! }
//! ```

use http::Method;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::collection::QueryableCollection;
use crate::dispatcher::{HandlerRequest, HandlerResponse, ParamVec};

/// Route arguments captured by the host router (path parameters).
///
/// The reserved key [`EMITTER_FORMAT_ARG`] selects the output format and is
/// removed before the handler sees the arguments.
pub type RouteArgs = ParamVec;

/// Route argument that overrides the output format (`/pets.{emitter_format}`).
pub const EMITTER_FORMAT_ARG: &str = "emitter_format";

/// The CRUD operation a verb is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudMethod {
    Read,
    Create,
    Update,
    Delete,
}

impl CrudMethod {
    pub const ALL: [CrudMethod; 4] = [
        CrudMethod::Read,
        CrudMethod::Create,
        CrudMethod::Update,
        CrudMethod::Delete,
    ];

    /// Fixed verb table: GET→read, POST→create, PUT→update, DELETE→delete.
    #[must_use]
    pub fn from_verb(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(CrudMethod::Read),
            Method::POST => Some(CrudMethod::Create),
            Method::PUT => Some(CrudMethod::Update),
            Method::DELETE => Some(CrudMethod::Delete),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CrudMethod::Read => "read",
            CrudMethod::Create => "create",
            CrudMethod::Update => "update",
            CrudMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for CrudMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability descriptor attached to a handler.
///
/// Built once with the builder methods below; the resource never probes the
/// handler for optional attributes at request time.
#[derive(Debug, Clone)]
pub struct HandlerCapabilities {
    /// Verbs the handler accepts; anything else is answered with 405
    pub allowed_methods: SmallVec<[Method; 4]>,
    /// CRUD operations the handler implements
    pub implemented: SmallVec<[CrudMethod; 4]>,
    /// Field projection for single items (empty = emit every field)
    pub fields: Vec<String>,
    /// Field projection for list-shaped results
    pub list_fields: Option<Vec<String>>,
    /// Anonymity reported when this handler is selected by authentication
    pub is_anonymous: bool,
    /// Human readable call signature per operation
    pub signatures: BTreeMap<CrudMethod, String>,
}

impl Default for HandlerCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerCapabilities {
    /// Read-only defaults: GET allowed, nothing implemented, no projection.
    #[must_use]
    pub fn new() -> Self {
        let mut allowed_methods = SmallVec::new();
        allowed_methods.push(Method::GET);
        Self {
            allowed_methods,
            implemented: SmallVec::new(),
            fields: Vec::new(),
            list_fields: None,
            is_anonymous: false,
            signatures: BTreeMap::new(),
        }
    }

    /// Replace the set of allowed verbs.
    #[must_use]
    pub fn allow(mut self, methods: &[Method]) -> Self {
        self.allowed_methods = methods.iter().cloned().collect();
        self
    }

    /// Declare which CRUD operations are implemented.
    #[must_use]
    pub fn implement(mut self, methods: &[CrudMethod]) -> Self {
        self.implemented = methods.iter().copied().collect();
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    #[must_use]
    pub fn list_fields(mut self, fields: &[&str]) -> Self {
        self.list_fields = Some(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    #[must_use]
    pub fn anonymous(mut self, is_anonymous: bool) -> Self {
        self.is_anonymous = is_anonymous;
        self
    }

    /// Document the expected call signature of an operation.
    #[must_use]
    pub fn signature(mut self, method: CrudMethod, signature: impl Into<String>) -> Self {
        self.signatures.insert(method, signature.into());
        self
    }

    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods.iter().any(|m| m == method)
    }

    #[must_use]
    pub fn implements(&self, method: CrudMethod) -> bool {
        self.implemented.contains(&method)
    }

    /// Field projection for a result of the given shape.
    #[must_use]
    pub fn projection(&self, list_shaped: bool) -> &[String] {
        match (&self.list_fields, list_shaped) {
            (Some(list_fields), true) => list_fields,
            _ => &self.fields,
        }
    }

    /// Allowed verbs as a comma separated `Allow` header value.
    #[must_use]
    pub fn allow_header(&self) -> String {
        self.allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What a handler operation produced.
pub enum HandlerOutput {
    /// A plain value, emitted with status 200
    Value(Value),
    /// A plain value that carries its own status code; still goes through the emitter
    WithStatus { status: u16, body: Value },
    /// A lazy collection; subject to range handling before emission
    Collection(Box<dyn QueryableCollection>),
    /// A fully formed response, returned as is
    Response(HandlerResponse),
}

impl HandlerOutput {
    /// Serialize any value into a [`HandlerOutput::Value`].
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, HandlerFault> {
        serde_json::to_value(value)
            .map(HandlerOutput::Value)
            .map_err(|e| HandlerFault::Unhandled(e.into()))
    }

    /// Whether the output counts as list-shaped for field projection.
    #[must_use]
    pub fn is_list_shaped(&self) -> bool {
        match self {
            HandlerOutput::Value(v) | HandlerOutput::WithStatus { body: v, .. } => v.is_array(),
            HandlerOutput::Collection(_) => true,
            HandlerOutput::Response(_) => false,
        }
    }
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOutput::Value(v) => f.debug_tuple("Value").field(v).finish(),
            HandlerOutput::WithStatus { status, body } => f
                .debug_struct("WithStatus")
                .field("status", status)
                .field("body", body)
                .finish(),
            HandlerOutput::Collection(_) => f.write_str("Collection(..)"),
            HandlerOutput::Response(r) => f.debug_tuple("Response").field(&r.status).finish(),
        }
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Value(value)
    }
}

impl From<HandlerResponse> for HandlerOutput {
    fn from(resp: HandlerResponse) -> Self {
        HandlerOutput::Response(resp)
    }
}

/// Structured form errors: field name → messages.
pub type FormErrors = BTreeMap<String, Vec<String>>;

/// A fault raised by a handler operation.
pub enum HandlerFault {
    /// Input failed form validation
    Validation(FormErrors),
    /// The operation was invoked with arguments it does not accept
    SignatureMismatch(String),
    /// The addressed object does not exist
    NotFound,
    /// The handler already decided on a response
    Status(HandlerResponse),
    /// Anything else
    Unhandled(anyhow::Error),
}

impl HandlerFault {
    /// Build a validation fault from `(field, message)` pairs.
    #[must_use]
    pub fn validation<I, K, V>(errors: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = FormErrors::new();
        for (field, message) in errors {
            map.entry(field.into()).or_default().push(message.into());
        }
        HandlerFault::Validation(map)
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerFault::Validation(_) => "validation",
            HandlerFault::SignatureMismatch(_) => "signature_mismatch",
            HandlerFault::NotFound => "not_found",
            HandlerFault::Status(_) => "explicit_status",
            HandlerFault::Unhandled(_) => "unhandled",
        }
    }
}

impl fmt::Debug for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerFault::Validation(errors) => f.debug_tuple("Validation").field(errors).finish(),
            HandlerFault::SignatureMismatch(msg) => {
                f.debug_tuple("SignatureMismatch").field(msg).finish()
            }
            HandlerFault::NotFound => f.write_str("NotFound"),
            HandlerFault::Status(resp) => f.debug_tuple("Status").field(&resp.status).finish(),
            HandlerFault::Unhandled(err) => f.debug_tuple("Unhandled").field(err).finish(),
        }
    }
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerFault::Validation(errors) => write!(f, "validation failed for {} field(s)", errors.len()),
            HandlerFault::SignatureMismatch(msg) => write!(f, "signature mismatch: {msg}"),
            HandlerFault::NotFound => f.write_str("not found"),
            HandlerFault::Status(resp) => write!(f, "handler responded with status {}", resp.status),
            HandlerFault::Unhandled(err) => write!(f, "{err}"),
        }
    }
}

impl From<anyhow::Error> for HandlerFault {
    fn from(err: anyhow::Error) -> Self {
        HandlerFault::Unhandled(err)
    }
}

impl From<serde_json::Error> for HandlerFault {
    fn from(err: serde_json::Error) -> Self {
        HandlerFault::Unhandled(err.into())
    }
}

pub type HandlerResult = Result<HandlerOutput, HandlerFault>;

/// The data handler behind a resource.
///
/// Every operation defaults to [`HandlerFault::NotFound`]; implement the ones
/// listed in [`HandlerCapabilities::implemented`].
pub trait Handler: Send + Sync {
    /// Capability descriptor, read once when the resource is built.
    fn capabilities(&self) -> &HandlerCapabilities;

    /// Variant served to callers no strategy authenticates.
    fn anonymous(&self) -> Option<Arc<dyn Handler>> {
        None
    }

    fn read(&self, req: &HandlerRequest, args: &RouteArgs) -> HandlerResult {
        let _ = (req, args);
        Err(HandlerFault::NotFound)
    }

    fn create(&self, req: &HandlerRequest, args: &RouteArgs) -> HandlerResult {
        let _ = (req, args);
        Err(HandlerFault::NotFound)
    }

    fn update(&self, req: &HandlerRequest, args: &RouteArgs) -> HandlerResult {
        let _ = (req, args);
        Err(HandlerFault::NotFound)
    }

    fn delete(&self, req: &HandlerRequest, args: &RouteArgs) -> HandlerResult {
        let _ = (req, args);
        Err(HandlerFault::NotFound)
    }

    /// Invoke the operation selected by the method resolver.
    fn invoke(&self, method: CrudMethod, req: &HandlerRequest, args: &RouteArgs) -> HandlerResult {
        match method {
            CrudMethod::Read => self.read(req, args),
            CrudMethod::Create => self.create(req, args),
            CrudMethod::Update => self.update(req, args),
            CrudMethod::Delete => self.delete(req, args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_table() {
        assert_eq!(CrudMethod::from_verb(&Method::GET), Some(CrudMethod::Read));
        assert_eq!(CrudMethod::from_verb(&Method::POST), Some(CrudMethod::Create));
        assert_eq!(CrudMethod::from_verb(&Method::PUT), Some(CrudMethod::Update));
        assert_eq!(CrudMethod::from_verb(&Method::DELETE), Some(CrudMethod::Delete));
        assert_eq!(CrudMethod::from_verb(&Method::PATCH), None);
        assert_eq!(CrudMethod::from_verb(&Method::HEAD), None);
    }

    #[test]
    fn test_projection_prefers_list_fields_for_lists() {
        let caps = HandlerCapabilities::new()
            .fields(&["id", "name", "owner"])
            .list_fields(&["id", "name"]);
        assert_eq!(caps.projection(false).len(), 3);
        assert_eq!(caps.projection(true), &["id".to_string(), "name".to_string()]);

        let caps = HandlerCapabilities::new().fields(&["id"]);
        assert_eq!(caps.projection(true), &["id".to_string()]);
    }

    #[test]
    fn test_allow_header() {
        let caps = HandlerCapabilities::new().allow(&[Method::GET, Method::POST]);
        assert_eq!(caps.allow_header(), "GET, POST");
        assert!(caps.allows(&Method::POST));
        assert!(!caps.allows(&Method::DELETE));
    }

    #[test]
    fn test_validation_groups_messages() {
        let fault = HandlerFault::validation([
            ("name", "required"),
            ("name", "too short"),
            ("age", "not a number"),
        ]);
        match fault {
            HandlerFault::Validation(errors) => {
                assert_eq!(errors["name"], vec!["required", "too short"]);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected fault {other:?}"),
        }
    }

    #[test]
    fn test_list_shape() {
        assert!(HandlerOutput::Value(json!([1, 2])).is_list_shaped());
        assert!(!HandlerOutput::Value(json!({"id": 1})).is_list_shaped());
    }
}
