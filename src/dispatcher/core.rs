//! Dispatcher core: request/response types and the [`Resource`] pipeline.

use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::collection::QueryableCollection;
use crate::config::ResourceConfig;
use crate::dispatcher::errors::{
    classify_fault, format_error, Classified, BAD_REQUEST, NOT_FOUND, RANGE_NOT_SATISFIABLE,
};
use crate::dispatcher::method::{resolve_method, CrudMethod, MethodError, MethodOverrides};
use crate::emitter::EmitterRegistry;
use crate::handler::{Handler, HandlerOutput, RouteArgs, EMITTER_FORMAT_ARG};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::mime::{self, BodyDecoder, MimeDecoder};
use crate::range::{parse_range_header, range_from_paging, RangeError, RangeRequest, ResolvedRange};
use crate::reporter::{CrashReport, CrashReporter, TracingCrashReporter};
use crate::security::{authenticate, AuthOutcome, AuthenticationStrategy, NoAuthentication, SecurityRequest};

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum inline query/route parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Header and cookie storage. Names are `Arc<str>` since they repeat across requests.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Query, form and route parameter storage.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Lazily produced response body chunks.
pub type BodyStream = Box<dyn Iterator<Item = Vec<u8>> + Send>;

/// Key prefix of delegated-authorization parameters stripped before handlers run.
pub const OAUTH_PARAM_PREFIX: &str = "oauth_";

/// Query parameter naming the output format.
pub const FORMAT_QUERY_PARAM: &str = "format";

/// Verb-keyed parameter blocks of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBlocks {
    /// Query string parameters
    pub get: ParamVec,
    /// Urlencoded POST body
    pub post: ParamVec,
    /// Urlencoded PUT body; only filled by [`mime::coerce_put`]
    pub put: ParamVec,
    /// Urlencoded DELETE body
    pub delete: ParamVec,
}

/// Uppercase a verb so `get` and `GET` resolve alike; unparseable results keep the original.
pub(crate) fn normalize_method(method: Method) -> Method {
    if method.as_str().bytes().all(|b| !b.is_ascii_lowercase()) {
        return method;
    }
    Method::from_bytes(method.as_str().to_ascii_uppercase().as_bytes()).unwrap_or(method)
}

fn strip_oauth(block: &ParamVec) -> ParamVec {
    block
        .iter()
        .filter(|(k, _)| !k.starts_with(OAUTH_PARAM_PREFIX))
        .cloned()
        .collect()
}

impl ParamBlocks {
    /// Copy of the blocks with every `oauth_*` key removed, block by block.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            get: strip_oauth(&self.get),
            post: strip_oauth(&self.post),
            put: strip_oauth(&self.put),
            delete: strip_oauth(&self.delete),
        }
    }
}

/// Request handed to the resource by the host transport.
///
/// Built with [`HandlerRequest::new`] and the chained setters:
///
/// ```rust
/// use brrtresource::dispatcher::HandlerRequest;
/// use http::Method;
///
/// let req = HandlerRequest::new(Method::POST, "/pets?format=yaml")
///     .header("authorization", "Bearer abc")
///     .body("application/json", br#"{"name":"Rex"}"#.to_vec());
/// assert_eq!(req.get_query_param("format"), Some("yaml"));
/// assert_eq!(req.path, "/pets");
/// ```
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Correlates every log line of this dispatch
    pub request_id: RequestId,
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub params: ParamBlocks,
    /// Raw request body
    pub body: Vec<u8>,
    /// Structured body, filled for POST and PUT before the handler runs
    pub data: Option<Value>,
}

impl HandlerRequest {
    /// New request for `uri` (`/path?query`); the query string fills the GET block.
    /// The verb is uppercased.
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        Self {
            request_id: RequestId::new(),
            method: normalize_method(method),
            path: path.to_string(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            params: ParamBlocks {
                get: mime::parse_form(query.as_bytes()),
                ..ParamBlocks::default()
            },
            body: Vec::new(),
            data: None,
        }
    }

    /// Add a header. `Cookie` headers also fill the cookie block and an
    /// `x-request-id` header is adopted as the request id when it parses.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("cookie") {
            for pair in value.split(';') {
                if let Some((k, v)) = pair.trim().split_once('=') {
                    self.cookies.push((Arc::from(k.trim()), v.trim().to_string()));
                }
            }
        }
        if name.eq_ignore_ascii_case(REQUEST_ID_HEADER) {
            self.request_id = RequestId::from_header_or_new(Some(value));
        }
        self.headers
            .push((Arc::from(name.to_ascii_lowercase().as_str()), value.to_string()));
        self
    }

    /// Add a query parameter to the GET block.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.params.get.push((Arc::from(name), value.to_string()));
        self
    }

    /// Set the body and its content type. Urlencoded POST and DELETE bodies also
    /// fill their parameter block; PUT bodies wait for [`mime::coerce_put`].
    #[must_use]
    pub fn body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
        self.headers
            .push((Arc::from("content-type"), content_type.to_string()));
        if mime::media_type(content_type) == mime::FORM_URLENCODED {
            match self.method {
                Method::POST => self.params.post = mime::parse_form(&body),
                Method::DELETE => self.params.delete = mime::parse_form(&body),
                _ => {}
            }
        }
        self.body = body;
        self
    }

    /// Get a query parameter by name; the last occurrence wins.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.params
            .get
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }

    /// Credential view for authentication strategies.
    #[must_use]
    pub fn security_request(&self) -> SecurityRequest<'_> {
        SecurityRequest {
            headers: &self.headers,
            query: &self.params.get,
            cookies: &self.cookies,
        }
    }

    /// The request with delegated-authorization parameters removed.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let params = self.params.sanitized();
        Self { params, ..self }
    }
}

/// Response body, buffered or chunked.
pub enum ResponseBody {
    Buffered(Vec<u8>),
    Stream(BodyStream),
}

impl ResponseBody {
    /// Collect the body into one buffer, draining a stream.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ResponseBody::Buffered(bytes) => bytes,
            ResponseBody::Stream(chunks) => chunks.flatten().collect(),
        }
    }

    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, ResponseBody::Stream(_))
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::Buffered(Vec::new())
    }
}

/// Response produced by a dispatch.
#[derive(Debug)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    pub headers: HeaderVec,
    pub body: ResponseBody,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Plain text response.
    #[must_use]
    pub fn text(status: u16, body: &str) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "text/plain; charset=utf-8".to_string()));
        Self::new(status, headers, ResponseBody::Buffered(body.as_bytes().to_vec()))
    }

    /// JSON response.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        Self::new(status, headers, ResponseBody::Buffered(bytes))
    }

    /// JSON `{"error": message}` response.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive).
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Fault that escaped the resource.
///
/// Only produced for unhandled faults while `display_errors` is off; the host
/// decides how to fail the request.
#[derive(Debug)]
pub enum DispatchError {
    Unhandled {
        request_id: RequestId,
        error: anyhow::Error,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Unhandled { request_id, error } => {
                write!(f, "unhandled fault in request {request_id}: {error}")
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Unhandled { error, .. } => Some(error.as_ref()),
        }
    }
}

/// Identity of the request being dispatched, kept for logs and crash reports.
struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
}

enum RangeFailure {
    Malformed,
    Unsatisfiable(RangeError),
    Collection(anyhow::Error),
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A handler exposed as an HTTP resource.
///
/// Everything held here is read-only after construction; all per-request
/// state lives on the stack of [`Resource::handle`], so one resource can be
/// shared by any number of concurrent requests.
pub struct Resource {
    handler: Arc<dyn Handler>,
    anonymous: Option<Arc<dyn Handler>>,
    strategies: Vec<Arc<dyn AuthenticationStrategy>>,
    config: ResourceConfig,
    emitters: EmitterRegistry,
    decoder: Arc<dyn BodyDecoder>,
    reporter: Arc<dyn CrashReporter>,
    overrides: MethodOverrides,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategies: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("Resource")
            .field("strategies", &strategies)
            .field("has_anonymous", &self.anonymous.is_some())
            .field("config", &self.config)
            .field("emitters", &self.emitters)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Resource`].
pub struct ResourceBuilder {
    handler: Arc<dyn Handler>,
    strategies: Vec<Arc<dyn AuthenticationStrategy>>,
    config: ResourceConfig,
    emitters: EmitterRegistry,
    decoder: Arc<dyn BodyDecoder>,
    reporter: Arc<dyn CrashReporter>,
    overrides: MethodOverrides,
}

impl ResourceBuilder {
    /// Append an authentication strategy; strategies are tried in insertion order.
    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn AuthenticationStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    #[must_use]
    pub fn config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn emitters(mut self, emitters: EmitterRegistry) -> Self {
        self.emitters = emitters;
        self
    }

    #[must_use]
    pub fn decoder(mut self, decoder: Arc<dyn BodyDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn CrashReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Map an extra verb (e.g. PATCH) onto a CRUD operation.
    #[must_use]
    pub fn method_override(mut self, verb: Method, method: CrudMethod) -> Self {
        self.overrides.insert(verb, method);
        self
    }

    #[must_use]
    pub fn build(self) -> Resource {
        let mut strategies = self.strategies;
        if strategies.is_empty() {
            strategies.push(Arc::new(NoAuthentication));
        }
        // Resolved once; never probed per request.
        let anonymous = self.handler.anonymous();
        let caps = self.handler.capabilities();
        info!(
            allowed = %caps.allow_header(),
            implemented = ?caps.implemented,
            strategies = strategies.len(),
            has_anonymous = anonymous.is_some(),
            formats = ?self.emitters.formats(),
            "Resource registered"
        );
        Resource {
            handler: self.handler,
            anonymous,
            strategies,
            config: self.config,
            emitters: self.emitters,
            decoder: self.decoder,
            reporter: self.reporter,
            overrides: self.overrides,
        }
    }
}

impl Resource {
    /// Resource with default strategies, configuration and collaborators.
    #[must_use]
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self::builder(handler).build()
    }

    #[must_use]
    pub fn builder(handler: Arc<dyn Handler>) -> ResourceBuilder {
        ResourceBuilder {
            handler,
            strategies: Vec::new(),
            config: ResourceConfig::default(),
            emitters: EmitterRegistry::default(),
            decoder: Arc::new(MimeDecoder),
            reporter: Arc::new(TracingCrashReporter),
            overrides: MethodOverrides::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Dispatch one request.
    ///
    /// Every outcome carries `Vary: Authorization`. `Err` is returned only for
    /// an unhandled fault while `display_errors` is off.
    pub fn handle(
        &self,
        req: HandlerRequest,
        route_args: RouteArgs,
    ) -> Result<HandlerResponse, DispatchError> {
        let started = Instant::now();
        let ctx = RequestContext {
            request_id: req.request_id,
            method: req.method.clone(),
            path: req.path.clone(),
        };
        debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            "Dispatch started"
        );

        let result = match catch_unwind(AssertUnwindSafe(|| self.dispatch(&ctx, req, route_args))) {
            Ok(result) => result,
            Err(panic) => {
                let err = anyhow::anyhow!("dispatch panicked: {}", panic_message(panic.as_ref()));
                self.unhandled(&ctx, None, err)
            }
        };

        match result {
            Ok(mut resp) => {
                resp.set_header("vary", "Authorization".to_string());
                info!(
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    path = %ctx.path,
                    status = resp.status,
                    latency_us = started.elapsed().as_micros() as u64,
                    "Dispatch complete"
                );
                Ok(resp)
            }
            Err(err) => {
                error!(
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    path = %ctx.path,
                    latency_us = started.elapsed().as_micros() as u64,
                    "Unhandled fault propagated to host"
                );
                Err(err)
            }
        }
    }

    fn dispatch(
        &self,
        ctx: &RequestContext,
        mut req: HandlerRequest,
        mut args: RouteArgs,
    ) -> Result<HandlerResponse, DispatchError> {
        let rid = ctx.request_id;

        // `method` is a public field, so hosts may have set it after `new`
        req.method = normalize_method(req.method);
        if req.method == Method::PUT {
            mime::coerce_put(&mut req);
        }

        let (handler, anonymous) = match authenticate(
            &self.strategies,
            &self.handler,
            self.anonymous.as_ref(),
            &req.security_request(),
            &req.method,
        ) {
            AuthOutcome::Authenticated { handler, anonymous } => (handler, anonymous),
            AuthOutcome::Anonymous(handler) => (handler, true),
            AuthOutcome::Challenge(strategy) => {
                warn!(request_id = %rid, strategy = %strategy.name(), "Authentication challenge");
                return Ok(strategy.challenge());
            }
        };
        debug!(request_id = %rid, anonymous, "Actor selected");

        if matches!(req.method, Method::POST | Method::PUT) {
            let content_type = req.content_type().unwrap_or("").to_string();
            match self.decoder.decode(&content_type, &req.body) {
                Ok(Some(data)) => req.data = Some(data),
                Ok(None) => {
                    let block = if req.method == Method::POST {
                        &req.params.post
                    } else {
                        &req.params.put
                    };
                    req.data = Some(mime::params_to_value(block));
                }
                Err(e) => {
                    warn!(request_id = %rid, error = %e, "Request body could not be decoded");
                    return Ok(HandlerResponse::text(400, BAD_REQUEST));
                }
            }
        }

        let crud = match resolve_method(handler.capabilities(), &req.method, &self.overrides) {
            Ok(crud) => crud,
            Err(MethodError::NotAllowed { allowed }) => {
                warn!(request_id = %rid, method = %req.method, "Method not allowed");
                let allow: Vec<&str> = allowed.iter().map(Method::as_str).collect();
                let mut resp = HandlerResponse::new(405, HeaderVec::new(), ResponseBody::default());
                resp.set_header("allow", allow.join(", "));
                return Ok(resp);
            }
            Err(MethodError::NotFound { method }) => {
                warn!(request_id = %rid, method = %method, "No handler operation for method");
                return Ok(HandlerResponse::text(404, NOT_FOUND));
            }
        };

        let format = self.determine_format(&req, &args);
        args.retain(|(k, _)| k.as_ref() != EMITTER_FORMAT_ARG);

        let req = req.sanitized();

        let caps = handler.capabilities();
        debug!(request_id = %rid, handler_method = %crud, format = %format, "Invoking handler");
        let output = match catch_unwind(AssertUnwindSafe(|| handler.invoke(crud, &req, &args))) {
            Ok(Ok(output)) => output,
            Ok(Err(fault)) => {
                debug!(request_id = %rid, fault = fault.kind(), "Handler raised fault");
                match classify_fault(fault, crud, caps, &self.config) {
                    Classified::Response(resp) => HandlerOutput::Response(resp),
                    Classified::Unhandled(err) => return self.unhandled(ctx, Some(crud), err),
                }
            }
            Err(panic) => {
                let err = anyhow::anyhow!("handler panicked: {}", panic_message(panic.as_ref()));
                return self.unhandled(ctx, Some(crud), err);
            }
        };

        let emitter = match self.emitters.resolve(&format) {
            Ok(emitter) => emitter,
            Err(e) => {
                warn!(request_id = %rid, format = %format, "Unknown output format");
                return Ok(HandlerResponse::text(400, &e.to_string()));
            }
        };
        let fields = caps.projection(output.is_list_shaped()).to_vec();

        let (status, value, range) = match output {
            HandlerOutput::Response(resp) => return Ok(resp),
            HandlerOutput::Value(value) => (200, value, None),
            HandlerOutput::WithStatus { status, body } => (status, body, None),
            HandlerOutput::Collection(collection) => {
                match self.realize(&req, collection.as_ref()) {
                    Ok((value, range)) => (200, value, range),
                    Err(RangeFailure::Malformed) => {
                        warn!(request_id = %rid, "Malformed range header");
                        return Ok(HandlerResponse::text(
                            400,
                            &format!("{BAD_REQUEST} malformed range header"),
                        ));
                    }
                    Err(RangeFailure::Unsatisfiable(e)) => {
                        warn!(request_id = %rid, reason = %e, "Range not satisfiable");
                        return Ok(HandlerResponse::text(
                            416,
                            &format!("{RANGE_NOT_SATISFIABLE}\n{e}"),
                        ));
                    }
                    Err(RangeFailure::Collection(err)) => {
                        return self.unhandled(ctx, Some(crud), err);
                    }
                }
            }
        };

        let body = if self.config.stream_output {
            emitter.stream_render(&value, &fields).map(ResponseBody::Stream)
        } else {
            emitter.render(&value, &fields).map(ResponseBody::Buffered)
        };
        let body = match body {
            Ok(body) => body,
            Err(err) => return self.unhandled(ctx, Some(crud), err.context("emitter failed")),
        };

        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), emitter.content_type().to_string()));
        let mut resp = HandlerResponse::new(status, headers, body);
        if let Some(range) = range {
            resp.status = 206;
            resp.set_header("content-range", range.content_range());
            debug!(request_id = %rid, range = %range, "Partial content");
        }
        Ok(resp)
    }

    /// Route argument, then `?format=`, then the configured default.
    fn determine_format(&self, req: &HandlerRequest, args: &RouteArgs) -> String {
        args.iter()
            .rfind(|(k, _)| k.as_ref() == EMITTER_FORMAT_ARG)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
            .or_else(|| req.get_query_param(FORMAT_QUERY_PARAM))
            .unwrap_or(&self.config.default_format)
            .to_string()
    }

    /// Range from the `Range` header, else from the paging query parameters.
    fn requested_range(&self, req: &HandlerRequest) -> Result<Option<RangeRequest>, RangeFailure> {
        if let Some(header) = req.get_header("range") {
            return parse_range_header(header).map_err(|_| RangeFailure::Malformed);
        }
        Ok(range_from_paging(
            &req.params.get,
            self.config.offset_param(),
            self.config.limit_param(),
        ))
    }

    /// Materialize a lazy collection, sliced to the requested range if any.
    fn realize(
        &self,
        req: &HandlerRequest,
        collection: &dyn QueryableCollection,
    ) -> Result<(Value, Option<ResolvedRange>), RangeFailure> {
        let Some(request) = self.requested_range(req)? else {
            let items = collection.all().map_err(RangeFailure::Collection)?;
            return Ok((Value::Array(items), None));
        };
        let total = collection.count().map_err(RangeFailure::Collection)?;
        let range = request.resolve(total).map_err(RangeFailure::Unsatisfiable)?;
        let items = collection
            .slice(range.start, range.end + 1)
            .map_err(RangeFailure::Collection)?;
        Ok((Value::Array(items), Some(range)))
    }

    /// Report and surface an unhandled fault according to configuration.
    fn unhandled(
        &self,
        ctx: &RequestContext,
        handler_method: Option<CrudMethod>,
        err: anyhow::Error,
    ) -> Result<HandlerResponse, DispatchError> {
        let traceback = err
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        error!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            handler_method = ?handler_method.map(|m| m.name()),
            error = %err,
            "Unhandled fault"
        );

        if self.config.email_errors {
            let report = CrashReport {
                request_id: ctx.request_id,
                method: ctx.method.to_string(),
                path: ctx.path.clone(),
                handler_method: handler_method.map(|m| m.name().to_string()),
                message: err.to_string(),
                traceback: traceback.clone(),
            };
            if catch_unwind(AssertUnwindSafe(|| self.reporter.report(&report))).is_err() {
                warn!(request_id = %ctx.request_id, "Crash reporter failed");
            }
        }

        if self.config.display_errors {
            return Ok(HandlerResponse::text(500, &format_error(&traceback)));
        }
        Err(DispatchError::Unhandled {
            request_id: ctx.request_id,
            error: err,
        })
    }
}
