//! Request body decoding.
//!
//! For POST and PUT the resource turns the raw body into a structured
//! `request.data` value before the handler runs. The [`BodyDecoder`] trait is the
//! seam; [`MimeDecoder`] is the default and picks a loader by content type:
//!
//! - `application/json` → `serde_json`
//! - `application/x-yaml`, `text/yaml` → `serde_yaml`
//! - `application/x-www-form-urlencoded` → form pairs as a JSON object
//!
//! A content type without a loader is not an error: the decoder returns
//! `Ok(None)` and the resource falls back to the POST/PUT parameter block.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::dispatcher::{HandlerRequest, ParamVec};

/// Media type of urlencoded form bodies.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// The body could not be decoded with the loader its content type selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub content_type: String,
    pub message: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot decode '{}' body: {}", self.content_type, self.message)
    }
}

impl std::error::Error for DecodeError {}

/// Turns a raw request body into structured parameters.
pub trait BodyDecoder: Send + Sync {
    /// `Ok(None)` when no loader handles `content_type`.
    fn decode(&self, content_type: &str, body: &[u8]) -> Result<Option<Value>, DecodeError>;
}

/// Media type without parameters, lowercased (`Application/JSON; charset=utf-8` → `application/json`).
#[must_use]
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Parse an `application/x-www-form-urlencoded` body into parameter pairs.
#[must_use]
pub fn parse_form(body: &[u8]) -> ParamVec {
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// Render parameter pairs as a JSON object; repeated keys keep the last value.
#[must_use]
pub fn params_to_value(params: &ParamVec) -> Value {
    let mut map = Map::new();
    for (k, v) in params {
        map.insert(k.to_string(), Value::String(v.clone()));
    }
    Value::Object(map)
}

/// Fill the PUT parameter block from an urlencoded body.
///
/// Hosts typically only parse form bodies for POST; the resource calls this
/// explicitly for PUT before authentication runs. Other verbs, non-form bodies
/// and an already filled block are left alone.
pub fn coerce_put(req: &mut HandlerRequest) {
    if req.method != http::Method::PUT || !req.params.put.is_empty() {
        return;
    }
    let is_form = req
        .content_type()
        .is_some_and(|ct| media_type(ct) == FORM_URLENCODED);
    if is_form {
        req.params.put = parse_form(&req.body);
        debug!(params = req.params.put.len(), "Coerced PUT form body");
    }
}

/// Content-type driven decoder for JSON, YAML and urlencoded forms.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeDecoder;

impl BodyDecoder for MimeDecoder {
    fn decode(&self, content_type: &str, body: &[u8]) -> Result<Option<Value>, DecodeError> {
        let mt = media_type(content_type);
        let fail = |message: String| DecodeError {
            content_type: mt.clone(),
            message,
        };
        let decoded = match mt.as_str() {
            "application/json" | "text/json" => {
                serde_json::from_slice(body).map_err(|e| fail(e.to_string()))?
            }
            "application/x-yaml" | "application/yaml" | "text/yaml" | "text/x-yaml" => {
                serde_yaml::from_slice(body).map_err(|e| fail(e.to_string()))?
            }
            FORM_URLENCODED => params_to_value(&parse_form(body)),
            _ => {
                debug!(content_type = %mt, "No body loader for content type");
                return Ok(None);
            }
        };
        Ok(Some(decoded))
    }
}
