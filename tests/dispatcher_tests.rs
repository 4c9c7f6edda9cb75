//! End-to-end tests for `Resource::handle`.
//!
//! Every test builds a `Resource` around a scripted handler and drives one or
//! more requests through the full pipeline: authentication, body decoding,
//! method resolution, invocation, fault classification, range handling and
//! emission.

use brrtresource::config::ResourceConfig;
use brrtresource::dispatcher::{DispatchError, HandlerRequest, HandlerResponse, Resource};
use brrtresource::handler::{
    CrudMethod, HandlerCapabilities, HandlerFault, HandlerOutput, RouteArgs, EMITTER_FORMAT_ARG,
};
use brrtresource::security::AuthenticationStrategy;
use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;

mod common;
use common::fixtures::{
    body_json, body_text, collection_handler, CountingStrategy, RecordingReporter, ScriptedHandler,
};

fn get(uri: &str) -> HandlerRequest {
    HandlerRequest::new(Method::GET, uri)
}

fn no_args() -> RouteArgs {
    RouteArgs::new()
}

fn dispatch(resource: &Resource, req: HandlerRequest) -> HandlerResponse {
    resource.handle(req, no_args()).unwrap()
}

fn ids(value: &Value) -> Vec<u64> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_u64().unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Range handling
// ---------------------------------------------------------------------------

#[test]
fn test_paging_query_yields_partial_content() {
    let resource = Resource::new(Arc::new(collection_handler(100)));
    let resp = dispatch(&resource, get("/items?offset=10&limit=5"));

    assert_eq!(resp.status, 206);
    assert_eq!(resp.get_header("Content-Range"), Some("items 10-14/100"));
    assert_eq!(resp.get_header("vary"), Some("Authorization"));
    assert_eq!(ids(&body_json(resp)), vec![10, 11, 12, 13, 14]);
}

#[test]
fn test_range_header_wins_over_paging() {
    let resource = Resource::new(Arc::new(collection_handler(100)));
    let req = get("/items?offset=0&limit=2").header("Range", "items=7-45");
    let resp = dispatch(&resource, req);

    assert_eq!(resp.status, 206);
    assert_eq!(resp.get_header("content-range"), Some("items 7-45/100"));
    assert_eq!(ids(&body_json(resp)).len(), 39);
}

#[test]
fn test_range_end_is_clamped() {
    let resource = Resource::new(Arc::new(collection_handler(100)));
    let resp = dispatch(&resource, get("/items").header("range", "items=7-150"));
    assert_eq!(resp.status, 206);
    assert_eq!(resp.get_header("content-range"), Some("items 7-99/100"));
}

#[test]
fn test_tail_paging() {
    let resource = Resource::new(Arc::new(collection_handler(50)));
    let resp = dispatch(&resource, get("/items?offset=&limit=10"));
    assert_eq!(resp.status, 206);
    assert_eq!(resp.get_header("content-range"), Some("items 40-49/50"));
    assert_eq!(ids(&body_json(resp)), (40..50).collect::<Vec<u64>>());
}

#[test]
fn test_paging_needs_both_keys() {
    let resource = Resource::new(Arc::new(collection_handler(20)));
    let resp = dispatch(&resource, get("/items?offset=5"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-range"), None);
    assert_eq!(ids(&body_json(resp)).len(), 20);
}

#[test]
fn test_custom_paging_params() {
    let config = ResourceConfig::default().with_paging_params("start", "count");
    let resource = Resource::builder(Arc::new(collection_handler(30)))
        .config(config)
        .build();
    let resp = dispatch(&resource, get("/items?start=3&count=2"));
    assert_eq!(resp.get_header("content-range"), Some("items 3-4/30"));

    let resp = dispatch(&resource, get("/items?offset=3&limit=2"));
    assert_eq!(resp.status, 200);
}

#[test]
fn test_malformed_range_header() {
    let resource = Resource::new(Arc::new(collection_handler(10)));
    let resp = dispatch(&resource, get("/items").header("range", "items=a-b"));
    assert_eq!(resp.status, 400);
    assert_eq!(body_text(resp), "Bad Request malformed range header");
}

#[test]
fn test_unsatisfiable_range() {
    let resource = Resource::new(Arc::new(collection_handler(10)));
    let resp = dispatch(&resource, get("/items").header("range", "items=20-"));
    assert_eq!(resp.status, 416);
    assert_eq!(
        body_text(resp),
        "Requested Range Not Satisfiable\nstart beyond last item"
    );

    let resp = dispatch(
        &resource,
        get("/items").header("range", "items=99999999999999999999-"),
    );
    assert_eq!(resp.status, 416);
    assert!(body_text(resp).ends_with("start beyond last item"));

    let resp = dispatch(&resource, get("/items").header("range", "items=-"));
    assert_eq!(resp.status, 416);
    assert!(body_text(resp).ends_with("no start or end supplied"));
}

#[test]
fn test_other_range_units_are_ignored() {
    let resource = Resource::new(Arc::new(collection_handler(10)));
    let req = get("/items?offset=2&limit=2").header("range", "bytes=0-99");
    let resp = dispatch(&resource, req);
    assert_eq!(resp.status, 200);
    assert_eq!(ids(&body_json(resp)).len(), 10);
}

#[test]
fn test_plain_lists_are_not_sliced() {
    let handler = ScriptedHandler::new(HandlerCapabilities::new().implement(&[CrudMethod::Read]))
        .on(CrudMethod::Read, |_, _| {
            Ok(HandlerOutput::Value(json!([{"id": 0}, {"id": 1}, {"id": 2}])))
        });
    let resource = Resource::new(Arc::new(handler));
    let resp = dispatch(&resource, get("/items?offset=1&limit=1"));
    assert_eq!(resp.status, 200);
    assert_eq!(ids(&body_json(resp)), vec![0, 1, 2]);
}

// ---------------------------------------------------------------------------
// Body decoding, method resolution, sanitizing
// ---------------------------------------------------------------------------

fn create_handler() -> ScriptedHandler {
    ScriptedHandler::new(
        HandlerCapabilities::new()
            .allow(&[Method::GET, Method::POST, Method::PUT])
            .implement(&[CrudMethod::Read, CrudMethod::Create, CrudMethod::Update]),
    )
    .on(CrudMethod::Create, |req, _| {
        Ok(HandlerOutput::WithStatus {
            status: 201,
            body: req.data.clone().unwrap_or(Value::Null),
        })
    })
    .on(CrudMethod::Update, |req, _| {
        Ok(HandlerOutput::Value(req.data.clone().unwrap_or(Value::Null)))
    })
}

#[test]
fn test_undecodable_post_body_never_reaches_handler() {
    let handler = Arc::new(create_handler());
    let resource = Resource::new(handler.clone());
    let req = HandlerRequest::new(Method::POST, "/pets").body("application/json", b"{oops".to_vec());
    let resp = dispatch(&resource, req);

    assert_eq!(resp.status, 400);
    assert_eq!(body_text(resp), "Bad Request");
    assert_eq!(handler.calls(), 0);
}

#[test]
fn test_post_json_keeps_handler_status() {
    let resource = Resource::new(Arc::new(create_handler()));
    let req = HandlerRequest::new(Method::POST, "/pets")
        .body("application/json", br#"{"name":"Rex"}"#.to_vec());
    let resp = dispatch(&resource, req);

    assert_eq!(resp.status, 201);
    assert_eq!(
        resp.get_header("content-type"),
        Some("application/json; charset=utf-8")
    );
    assert_eq!(body_json(resp), json!({"name": "Rex"}));
}

#[test]
fn test_put_form_body_is_coerced() {
    let handler = Arc::new(create_handler());
    let resource = Resource::new(handler.clone());
    let req = HandlerRequest::new(Method::PUT, "/pets/1").body(
        "application/x-www-form-urlencoded",
        b"name=Rex&oauth_signature=abc".to_vec(),
    );
    let resp = dispatch(&resource, req);
    assert_eq!(resp.status, 200);

    let (seen, _) = handler.last_seen().unwrap();
    let keys: Vec<&str> = seen.params.put.iter().map(|(k, _)| k.as_ref()).collect();
    assert_eq!(keys, vec!["name"]);
}

#[test]
fn test_lowercase_verbs_are_normalized() {
    let lower_get = HandlerRequest::new(Method::from_bytes(b"get").unwrap(), "/items");
    assert_eq!(lower_get.method, Method::GET);
    let resource = Resource::new(Arc::new(collection_handler(3)));
    let resp = dispatch(&resource, lower_get);
    assert_eq!(resp.status, 200);
    assert_eq!(ids(&body_json(resp)), vec![0, 1, 2]);

    // verb overwritten by the host after construction
    let handler = Arc::new(create_handler());
    let resource = Resource::new(handler.clone());
    let mut req = HandlerRequest::new(Method::PUT, "/pets/1")
        .body("application/x-www-form-urlencoded", b"name=Rex".to_vec());
    req.method = Method::from_bytes(b"put").unwrap();
    let resp = dispatch(&resource, req);
    assert_eq!(resp.status, 200);
    assert_eq!(body_json(resp), json!({"name": "Rex"}));

    let (seen, _) = handler.last_seen().unwrap();
    assert_eq!(seen.method, Method::PUT);
    assert_eq!(seen.params.put.len(), 1);
}

#[test]
fn test_unknown_body_type_falls_back_to_form_block() {
    let resource = Resource::new(Arc::new(create_handler()));
    let req = HandlerRequest::new(Method::POST, "/pets").body("application/octet-stream", vec![0, 1]);
    let resp = dispatch(&resource, req);
    assert_eq!(resp.status, 201);
    assert_eq!(body_json(resp), json!({}));
}

#[test]
fn test_oauth_params_are_stripped() {
    let handler = Arc::new(create_handler().on(CrudMethod::Read, |_, _| Ok(json!({}).into())));
    let resource = Resource::new(handler.clone());
    let resp = dispatch(&resource, get("/pets?oauth_token=t&oauth_nonce=n&name=rex"));
    assert_eq!(resp.status, 200);

    let (seen, _) = handler.last_seen().unwrap();
    assert_eq!(seen.get_query_param("name"), Some("rex"));
    assert_eq!(seen.get_query_param("oauth_token"), None);
    assert_eq!(seen.params.get.len(), 1);
}

#[test]
fn test_method_not_allowed_lists_verbs() {
    let handler = Arc::new(create_handler());
    let resource = Resource::new(handler.clone());
    let resp = dispatch(&resource, HandlerRequest::new(Method::DELETE, "/pets/1"));

    assert_eq!(resp.status, 405);
    assert_eq!(resp.get_header("allow"), Some("GET, POST, PUT"));
    assert_eq!(handler.calls(), 0);
}

#[test]
fn test_patch_is_not_found_without_override() {
    let caps = HandlerCapabilities::new()
        .allow(&[Method::GET, Method::PATCH])
        .implement(&[CrudMethod::Read, CrudMethod::Update]);
    let handler = Arc::new(
        ScriptedHandler::new(caps).on(CrudMethod::Update, |_, _| Ok(json!({"patched": true}).into())),
    );

    let plain = Resource::new(handler.clone());
    let resp = dispatch(&plain, HandlerRequest::new(Method::PATCH, "/pets/1"));
    assert_eq!(resp.status, 404);
    assert_eq!(handler.calls(), 0);

    let patched = Resource::builder(handler.clone())
        .method_override(Method::PATCH, CrudMethod::Update)
        .build();
    let resp = dispatch(&patched, HandlerRequest::new(Method::PATCH, "/pets/1"));
    assert_eq!(resp.status, 200);
    assert_eq!(body_json(resp), json!({"patched": true}));
}

// ---------------------------------------------------------------------------
// Output format and projection
// ---------------------------------------------------------------------------

fn pet_handler() -> ScriptedHandler {
    ScriptedHandler::new(
        HandlerCapabilities::new()
            .implement(&[CrudMethod::Read])
            .fields(&["id", "name", "owner"])
            .list_fields(&["id"]),
    )
    .on(CrudMethod::Read, |_, args| {
        let pet = |id: u64| json!({"id": id, "name": "Rex", "owner": "ann", "secret": "x"});
        match args.iter().find(|(k, _)| k.as_ref() == "id") {
            Some((_, id)) => Ok(pet(id.parse().unwrap_or(0)).into()),
            None => Ok(json!([pet(1), pet(2)]).into()),
        }
    })
}

fn args(pairs: &[(&str, &str)]) -> RouteArgs {
    pairs
        .iter()
        .map(|(k, v)| (Arc::from(*k), (*v).to_string()))
        .collect()
}

#[test]
fn test_field_projection_by_shape() {
    let resource = Resource::new(Arc::new(pet_handler()));
    let one = resource.handle(get("/pets/7"), args(&[("id", "7")])).unwrap();
    assert_eq!(body_json(one), json!({"id": 7, "name": "Rex", "owner": "ann"}));

    let many = dispatch(&resource, get("/pets"));
    assert_eq!(body_json(many), json!([{"id": 1}, {"id": 2}]));
}

#[test]
fn test_route_format_beats_query_format() {
    let handler = Arc::new(pet_handler());
    let resource = Resource::new(handler.clone());
    let resp = resource
        .handle(
            get("/pets/1.yaml?format=json"),
            args(&[("id", "1"), (EMITTER_FORMAT_ARG, "yaml")]),
        )
        .unwrap();
    assert_eq!(
        resp.get_header("content-type"),
        Some("application/x-yaml; charset=utf-8")
    );
    let text = body_text(resp);
    assert!(text.contains("name: Rex"));

    let (_, seen_args) = handler.last_seen().unwrap();
    assert!(seen_args.iter().all(|(k, _)| k.as_ref() != EMITTER_FORMAT_ARG));
}

#[test]
fn test_query_format() {
    let resource = Resource::new(Arc::new(pet_handler()));
    let resp = dispatch(&resource, get("/pets?format=yaml"));
    assert_eq!(
        resp.get_header("content-type"),
        Some("application/x-yaml; charset=utf-8")
    );
}

#[test]
fn test_unknown_format() {
    let resource = Resource::new(Arc::new(pet_handler()));
    let resp = dispatch(&resource, get("/pets?format=xml"));
    assert_eq!(resp.status, 400);
    assert_eq!(body_text(resp), "Invalid output format specified 'xml'.");
}

#[test]
fn test_streamed_output_matches_buffered() {
    let buffered = Resource::new(Arc::new(collection_handler(25)));
    let streamed = Resource::builder(Arc::new(collection_handler(25)))
        .config(ResourceConfig::default().with_stream_output(true))
        .build();

    let a = dispatch(&buffered, get("/items?offset=5&limit=10"));
    let b = dispatch(&streamed, get("/items?offset=5&limit=10"));
    assert!(!a.body.is_stream());
    assert!(b.body.is_stream());
    assert_eq!(b.status, 206);
    assert_eq!(body_json(a), body_json(b));
}

// ---------------------------------------------------------------------------
// Fault classification
// ---------------------------------------------------------------------------

fn faulty(fault: fn() -> HandlerFault) -> Arc<ScriptedHandler> {
    let caps = HandlerCapabilities::new()
        .implement(&[CrudMethod::Read])
        .signature(CrudMethod::Read, "read(request, pet_id)");
    Arc::new(ScriptedHandler::new(caps).on(CrudMethod::Read, move |_, _| Err(fault())))
}

#[test]
fn test_signature_mismatch_with_display_errors() {
    let resource = Resource::new(faulty(|| {
        HandlerFault::SignatureMismatch("got an unexpected keyword 'color'".to_string())
    }));
    let resp = dispatch(&resource, get("/pets/1"));
    assert_eq!(resp.status, 400);
    let text = body_text(resp);
    assert!(text.contains("crash report:"));
    assert!(text.contains("Method signature does not match."));
    assert!(text.contains("Signature should be: read(request, pet_id)"));
    assert!(text.contains("Exception was: got an unexpected keyword 'color'"));
}

#[test]
fn test_signature_mismatch_without_display_errors() {
    let resource = Resource::builder(faulty(|| {
        HandlerFault::SignatureMismatch("got an unexpected keyword 'color'".to_string())
    }))
    .config(ResourceConfig::default().with_display_errors(false))
    .build();
    let resp = dispatch(&resource, get("/pets/1"));
    assert_eq!(resp.status, 400);
    let text = body_text(resp);
    assert!(text.contains("Signature should be: read(request, pet_id)"));
    assert!(!text.contains("unexpected keyword"));
}

#[test]
fn test_validation_and_not_found_faults() {
    let resource = Resource::new(faulty(|| HandlerFault::validation([("name", "required")])));
    let resp = dispatch(&resource, get("/pets/1"));
    assert_eq!(resp.status, 400);
    assert_eq!(body_text(resp), r#"Bad Request {"name":["required"]}"#);

    let resource = Resource::new(faulty(|| HandlerFault::NotFound));
    let resp = dispatch(&resource, get("/pets/1"));
    assert_eq!(resp.status, 404);
    assert_eq!(resp.get_header("vary"), Some("Authorization"));
}

#[test]
fn test_explicit_status_fault_is_verbatim() {
    let resource = Resource::new(faulty(|| {
        HandlerFault::Status(HandlerResponse::text(409, "Conflict/Duplicate"))
    }));
    let resp = dispatch(&resource, get("/pets/1"));
    assert_eq!(resp.status, 409);
    assert_eq!(resp.get_header("content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(body_text(resp), "Conflict/Duplicate");
}

#[test]
fn test_unhandled_fault_is_reported_and_displayed() {
    let reporter = Arc::new(RecordingReporter::default());
    let resource = Resource::builder(faulty(|| {
        HandlerFault::Unhandled(anyhow::anyhow!("database exploded").context("loading pet"))
    }))
    .reporter(reporter.clone())
    .build();

    let resp = dispatch(&resource, get("/pets/1"));
    assert_eq!(resp.status, 500);
    let text = body_text(resp);
    assert!(text.contains("crash report:\n\nloading pet\ndatabase exploded"));

    let reports = reporter.reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].handler_method.as_deref(), Some("read"));
    assert_eq!(reports[0].path, "/pets/1");
}

#[test]
fn test_unhandled_fault_propagates_when_not_displayed() {
    let reporter = Arc::new(RecordingReporter::default());
    let resource = Resource::builder(faulty(|| HandlerFault::Unhandled(anyhow::anyhow!("boom"))))
        .config(ResourceConfig::default().with_display_errors(false))
        .reporter(reporter.clone())
        .build();

    let req = get("/pets/1");
    let request_id = req.request_id;
    match resource.handle(req, no_args()) {
        Err(DispatchError::Unhandled { request_id: id, error }) => {
            assert_eq!(id, request_id);
            assert_eq!(error.to_string(), "boom");
        }
        Ok(resp) => panic!("expected propagation, got status {}", resp.status),
    }
    assert_eq!(reporter.reports.lock().len(), 1);
}

#[test]
fn test_email_errors_off_skips_reporter() {
    let reporter = Arc::new(RecordingReporter::default());
    let resource = Resource::builder(faulty(|| HandlerFault::Unhandled(anyhow::anyhow!("boom"))))
        .config(ResourceConfig::default().with_email_errors(false))
        .reporter(reporter.clone())
        .build();
    let resp = dispatch(&resource, get("/pets/1"));
    assert_eq!(resp.status, 500);
    assert!(reporter.reports.lock().is_empty());
}

#[test]
fn test_handler_panic_is_contained() {
    let caps = HandlerCapabilities::new().implement(&[CrudMethod::Read]);
    let handler = ScriptedHandler::new(caps).on(CrudMethod::Read, |_, _| panic!("kaboom"));
    let resource = Resource::new(Arc::new(handler));
    let resp = dispatch(&resource, get("/pets/1"));
    assert_eq!(resp.status, 500);
    assert!(body_text(resp).contains("handler panicked: kaboom"));
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[test]
fn test_challenge_short_circuits_pipeline() {
    let handler = Arc::new(pet_handler());
    let strategy = Arc::new(CountingStrategy::new(false, 401));
    let resource = Resource::builder(handler.clone())
        .strategy(strategy.clone())
        .build();

    let resp = dispatch(&resource, get("/pets?format=xml"));
    assert_eq!(resp.status, 401);
    assert_eq!(resp.get_header("vary"), Some("Authorization"));
    assert_eq!(strategy.calls(), 1);
    assert_eq!(handler.calls(), 0);
}

#[test]
fn test_anonymous_variant_serves_allowed_verbs() {
    let anonymous = Arc::new(
        ScriptedHandler::new(
            HandlerCapabilities::new()
                .implement(&[CrudMethod::Read])
                .anonymous(true),
        )
        .on(CrudMethod::Read, |_, _| Ok(json!({"public": true}).into())),
    );
    let handler = Arc::new(create_handler().with_anonymous(anonymous.clone()));
    let strategy: Arc<dyn AuthenticationStrategy> = Arc::new(CountingStrategy::new(false, 401));
    let resource = Resource::builder(handler.clone()).strategy(strategy).build();

    let resp = dispatch(&resource, get("/pets"));
    assert_eq!(resp.status, 200);
    assert_eq!(body_json(resp), json!({"public": true}));
    assert_eq!(anonymous.calls(), 1);
    assert_eq!(handler.calls(), 0);

    let post = HandlerRequest::new(Method::POST, "/pets").body("application/json", b"{}".to_vec());
    let resp = dispatch(&resource, post);
    assert_eq!(resp.status, 401);
}

#[test]
fn test_request_id_is_adopted_from_header() {
    let upstream = brrtresource::ids::RequestId::new();
    let req = get("/pets").header("X-Request-Id", &upstream.to_string());
    assert_eq!(req.request_id, upstream);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_concurrent_threads_share_one_resource() {
    let resource = Arc::new(Resource::new(Arc::new(collection_handler(100))));
    let workers: Vec<_> = (0..8u64)
        .map(|i| {
            let resource = Arc::clone(&resource);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    let uri = format!("/items?offset={}&limit=3", i * 10);
                    let resp = resource.handle(get(&uri), RouteArgs::new()).unwrap();
                    assert_eq!(
                        resp.get_header("content-range").map(str::to_string),
                        Some(format!("items {}-{}/100", i * 10, i * 10 + 2))
                    );
                    assert_eq!(ids(&body_json(resp)), vec![i * 10, i * 10 + 1, i * 10 + 2]);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
}

#[test]
fn test_concurrent_coroutines_share_one_resource() {
    common::test_runtime::setup_may_runtime();
    let resource = Arc::new(Resource::new(Arc::new(collection_handler(40))));
    let handles: Vec<_> = (0..16u64)
        .map(|i| {
            let resource = Arc::clone(&resource);
            let start = i % 40;
            // SAFETY: the coroutine only touches the shared resource and its own locals
            unsafe {
                may::coroutine::spawn(move || {
                    let req = get("/items").header("range", &format!("items={start}-"));
                    let resp = resource.handle(req, RouteArgs::new()).unwrap();
                    (resp.status, resp.get_header("content-range").map(str::to_string))
                })
            }
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        let (status, range) = h.join().unwrap();
        assert_eq!(status, 206);
        assert_eq!(range, Some(format!("items {i}-39/40")));
    }
}
