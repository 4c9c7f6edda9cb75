#![allow(dead_code)]

pub mod fixtures {
    use brrtresource::collection::VecCollection;
    use brrtresource::dispatcher::{HandlerRequest, HandlerResponse};
    use brrtresource::handler::{
        CrudMethod, Handler, HandlerCapabilities, HandlerFault, HandlerOutput, HandlerResult,
        RouteArgs,
    };
    use brrtresource::reporter::{CrashReport, CrashReporter};
    use brrtresource::security::{AuthenticationStrategy, SecurityRequest};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type Op = Box<dyn Fn(&HandlerRequest, &RouteArgs) -> HandlerResult + Send + Sync>;

    /// Handler whose operations are closures; records every invocation.
    pub struct ScriptedHandler {
        caps: HandlerCapabilities,
        ops: HashMap<CrudMethod, Op>,
        anonymous: Option<Arc<dyn Handler>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(HandlerRequest, RouteArgs)>>,
    }

    impl ScriptedHandler {
        pub fn new(caps: HandlerCapabilities) -> Self {
            Self {
                caps,
                ops: HashMap::new(),
                anonymous: None,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn on<F>(mut self, method: CrudMethod, op: F) -> Self
        where
            F: Fn(&HandlerRequest, &RouteArgs) -> HandlerResult + Send + Sync + 'static,
        {
            self.ops.insert(method, Box::new(op));
            self
        }

        pub fn with_anonymous(mut self, anonymous: Arc<dyn Handler>) -> Self {
            self.anonymous = Some(anonymous);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Request and route arguments of the most recent invocation.
        pub fn last_seen(&self) -> Option<(HandlerRequest, RouteArgs)> {
            self.seen.lock().last().cloned()
        }
    }

    impl Handler for ScriptedHandler {
        fn capabilities(&self) -> &HandlerCapabilities {
            &self.caps
        }

        fn anonymous(&self) -> Option<Arc<dyn Handler>> {
            self.anonymous.clone()
        }

        fn invoke(&self, method: CrudMethod, req: &HandlerRequest, args: &RouteArgs) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push((req.clone(), args.clone()));
            match self.ops.get(&method) {
                Some(op) => op(req, args),
                None => Err(HandlerFault::NotFound),
            }
        }
    }

    pub fn numbers(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "id": i, "name": format!("item-{i}") })).collect()
    }

    /// GET handler serving a lazy collection of `n` items.
    pub fn collection_handler(n: usize) -> ScriptedHandler {
        ScriptedHandler::new(HandlerCapabilities::new().implement(&[CrudMethod::Read])).on(
            CrudMethod::Read,
            move |_, _| Ok(HandlerOutput::Collection(Box::new(VecCollection::new(numbers(n))))),
        )
    }

    /// Strategy with a fixed answer that counts how often it was asked.
    pub struct CountingStrategy {
        accept: bool,
        challenge_status: u16,
        calls: AtomicUsize,
    }

    impl CountingStrategy {
        pub fn new(accept: bool, challenge_status: u16) -> Self {
            Self {
                accept,
                challenge_status,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AuthenticationStrategy for CountingStrategy {
        fn is_authenticated(&self, _req: &SecurityRequest) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.accept
        }

        fn challenge(&self) -> HandlerResponse {
            HandlerResponse::text(self.challenge_status, "challenge")
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    /// Reporter that keeps every report.
    #[derive(Default)]
    pub struct RecordingReporter {
        pub reports: Mutex<Vec<CrashReport>>,
    }

    impl CrashReporter for RecordingReporter {
        fn report(&self, report: &CrashReport) {
            self.reports.lock().push(report.clone());
        }
    }

    pub fn body_text(resp: HandlerResponse) -> String {
        String::from_utf8(resp.body.into_bytes()).unwrap()
    }

    pub fn body_json(resp: HandlerResponse) -> Value {
        serde_json::from_slice(&resp.body.into_bytes()).unwrap()
    }
}

pub mod test_runtime {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x10_0000);
        });
    }
}
