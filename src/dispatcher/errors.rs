//! Fault classification.
//!
//! Every fault a handler operation raises ends up here. All kinds except
//! [`HandlerFault::Unhandled`] become a response on the spot; unhandled faults
//! are returned to the resource, which reports and surfaces them according to
//! its configuration.
//!
//! | fault | response |
//! |-------|----------|
//! | `Validation` | 400 `Bad Request {errors}` |
//! | `SignatureMismatch` | 400 with the expected signature (and the raw fault text when `display_errors` is on) |
//! | `NotFound` | 404 |
//! | `Status` | the carried response, verbatim |

use crate::config::ResourceConfig;
use crate::dispatcher::HandlerResponse;
use crate::handler::{CrudMethod, FormErrors, HandlerCapabilities, HandlerFault};

pub const BAD_REQUEST: &str = "Bad Request";
pub const NOT_FOUND: &str = "Not Found";
pub const RANGE_NOT_SATISFIABLE: &str = "Requested Range Not Satisfiable";

/// Outcome of classifying a fault.
#[derive(Debug)]
pub enum Classified {
    Response(HandlerResponse),
    Unhandled(anyhow::Error),
}

/// Wrap a message in the crash report banner used for error bodies.
#[must_use]
pub fn format_error(message: &str) -> String {
    format!(
        "{}/{} crash report:\n\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        message
    )
}

/// Body of a signature mismatch response, before [`format_error`] wrapping.
#[must_use]
pub fn signature_message(signature: Option<&str>, fault: Option<&str>) -> String {
    let mut msg = String::from("Method signature does not match.\n\n");
    match signature.filter(|s| !s.is_empty()) {
        Some(sig) => {
            msg.push_str("Signature should be: ");
            msg.push_str(sig);
        }
        None => msg.push_str("Resource does not expect any parameters."),
    }
    if let Some(fault) = fault {
        msg.push_str("\n\nException was: ");
        msg.push_str(fault);
    }
    msg
}

fn validation_response(errors: &FormErrors) -> HandlerResponse {
    let rendered = serde_json::to_string(errors).unwrap_or_default();
    HandlerResponse::text(400, &format!("{BAD_REQUEST} {rendered}"))
}

/// Turn a handler fault into a response, or hand it back as unhandled.
pub fn classify_fault(
    fault: HandlerFault,
    method: CrudMethod,
    caps: &HandlerCapabilities,
    config: &ResourceConfig,
) -> Classified {
    match fault {
        HandlerFault::Validation(errors) => Classified::Response(validation_response(&errors)),
        HandlerFault::SignatureMismatch(raw) => {
            let signature = caps.signatures.get(&method).map(String::as_str);
            let fault_text = config.display_errors.then_some(raw.as_str());
            let msg = signature_message(signature, fault_text);
            Classified::Response(HandlerResponse::text(400, &format_error(&msg)))
        }
        HandlerFault::NotFound => Classified::Response(HandlerResponse::text(404, NOT_FOUND)),
        HandlerFault::Status(resp) => Classified::Response(resp),
        HandlerFault::Unhandled(err) => Classified::Unhandled(err),
    }
}
