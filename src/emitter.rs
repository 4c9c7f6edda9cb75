//! # Emitter Module
//!
//! Emitters turn a handler result plus a field projection into bytes of one
//! content type. The resource only knows the [`Emitter`] trait and looks the
//! emitter up by format name in an [`EmitterRegistry`].
//!
//! ## Built-in Emitters
//!
//! | format | content type |
//! |--------|--------------|
//! | `json` | `application/json; charset=utf-8` |
//! | `yaml` | `application/x-yaml; charset=utf-8` |
//!
//! Further formats are added with [`EmitterRegistry::register`].
//!
//! ## Field Projection
//!
//! A non-empty projection keeps only the listed keys of every object in the
//! result (for arrays, of every element). An empty projection emits the value
//! unchanged.
//!
//! ## Streaming
//!
//! [`Emitter::stream_render`] produces the same content as
//! [`Emitter::render`] split into chunks. The default implementation yields one
//! chunk; the compact [`JsonEmitter`] encodes one array element per chunk as the
//! body is read.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dispatcher::BodyStream;

/// Serializer for one output format.
pub trait Emitter: Send + Sync {
    /// Content type written on responses produced by this emitter.
    fn content_type(&self) -> &str;

    /// Serialize the whole result into one buffer.
    fn render(&self, result: &Value, fields: &[String]) -> anyhow::Result<Vec<u8>>;

    /// Serialize the result as a sequence of chunks.
    fn stream_render(&self, result: &Value, fields: &[String]) -> anyhow::Result<BodyStream> {
        let bytes = self.render(result, fields)?;
        Ok(Box::new(std::iter::once(bytes)))
    }
}

/// Keep only the projected keys of every object in `value`.
#[must_use]
pub fn project(value: &Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return value.clone();
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| project(v, fields)).collect()),
        Value::Object(obj) => {
            let mut out = Map::new();
            for field in fields {
                if let Some(v) = obj.get(field) {
                    out.insert(field.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// JSON output through `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEmitter {
    pretty: bool,
}

impl JsonEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self { pretty: false }
    }

    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn encode(&self, value: &Value) -> anyhow::Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }
}

impl Emitter for JsonEmitter {
    fn content_type(&self) -> &str {
        "application/json; charset=utf-8"
    }

    fn render(&self, result: &Value, fields: &[String]) -> anyhow::Result<Vec<u8>> {
        self.encode(&project(result, fields))
    }

    /// Compact arrays are encoded one element per chunk as the body is pulled.
    /// Pretty output has a layout that spans elements and goes out as one chunk.
    fn stream_render(&self, result: &Value, fields: &[String]) -> anyhow::Result<BodyStream> {
        let projected = project(result, fields);
        let items = match projected {
            Value::Array(items) if !self.pretty => items,
            other => return Ok(Box::new(std::iter::once(self.encode(&other)?))),
        };
        let elements = items.into_iter().enumerate().map(|(idx, item)| {
            let mut chunk = if idx == 0 { Vec::new() } else { b",".to_vec() };
            if let Err(e) = serde_json::to_writer(&mut chunk, &item) {
                tracing::error!(error = %e, index = idx, "Failed to encode streamed element");
            }
            chunk
        });
        Ok(Box::new(
            std::iter::once(b"[".to_vec())
                .chain(elements)
                .chain(std::iter::once(b"]".to_vec())),
        ))
    }
}

/// YAML output through `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlEmitter;

impl Emitter for YamlEmitter {
    fn content_type(&self) -> &str {
        "application/x-yaml; charset=utf-8"
    }

    fn render(&self, result: &Value, fields: &[String]) -> anyhow::Result<Vec<u8>> {
        Ok(serde_yaml::to_string(&project(result, fields))?.into_bytes())
    }
}

/// Requested output format has no registered emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat {
    pub format: String,
}

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid output format specified '{}'.", self.format)
    }
}

impl std::error::Error for UnknownFormat {}

/// Format name → emitter lookup.
#[derive(Clone)]
pub struct EmitterRegistry {
    emitters: HashMap<String, Arc<dyn Emitter>>,
}

impl Default for EmitterRegistry {
    /// Registry with the built-in `json` and `yaml` emitters.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("json", Arc::new(JsonEmitter::new()));
        registry.register("yaml", Arc::new(YamlEmitter));
        registry
    }
}

impl fmt::Debug for EmitterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<&String> = self.emitters.keys().collect();
        formats.sort();
        f.debug_struct("EmitterRegistry").field("formats", &formats).finish()
    }
}

impl EmitterRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            emitters: HashMap::new(),
        }
    }

    /// Register (or replace) the emitter for a format name.
    pub fn register(&mut self, format: &str, emitter: Arc<dyn Emitter>) {
        self.emitters.insert(format.to_ascii_lowercase(), emitter);
    }

    /// Look up the emitter for a format name (case-insensitive).
    pub fn resolve(&self, format: &str) -> Result<Arc<dyn Emitter>, UnknownFormat> {
        self.emitters
            .get(&format.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| UnknownFormat {
                format: format.to_string(),
            })
    }

    #[must_use]
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.emitters.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}
