//! # Resource Configuration Module
//!
//! One explicit configuration struct handed to every
//! [`Resource`](crate::dispatcher::Resource) at construction time.
//!
//! ## Settings
//!
//! | field | default | environment |
//! |-------|---------|-------------|
//! | `email_errors` | `true` | `BRRTR_EMAIL_ERRORS` |
//! | `display_errors` | `true` | `BRRTR_DISPLAY_ERRORS` |
//! | `stream_output` | `false` | `BRRTR_STREAM_OUTPUT` |
//! | `paging_params` | `offset`, `limit` | `BRRTR_PAGINATION_PARAMS` (`offset,limit`) |
//! | `default_format` | `json` | `BRRTR_DEFAULT_FORMAT` |
//!
//! - **email_errors**: hand unhandled faults to the crash reporter
//! - **display_errors**: answer unhandled faults with a 500 carrying the fault chain,
//!   and include raw fault text in signature-mismatch responses
//! - **stream_output**: emit bodies as a chunk sequence instead of one buffer
//!
//! With both `email_errors` and `display_errors` off, an unhandled fault is
//! returned to the host as `DispatchError::Unhandled`.
//!
//! ## YAML
//!
//! ```yaml
//! email_errors: false
//! display_errors: true
//! stream_output: true
//! paging_params: [page_offset, page_limit]
//! ```
//!
//! Missing keys keep their defaults.

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::path::Path;

fn default_true() -> bool {
    true
}

fn default_paging_params() -> (String, String) {
    ("offset".to_string(), "limit".to_string())
}

fn default_format() -> String {
    "json".to_string()
}

/// Resource behaviour switches; see the module docs for defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "default_true")]
    pub email_errors: bool,
    #[serde(default = "default_true")]
    pub display_errors: bool,
    #[serde(default)]
    pub stream_output: bool,
    /// Query parameter names for (offset, limit) paging
    #[serde(default = "default_paging_params")]
    pub paging_params: (String, String),
    /// Format used when neither the route nor the query names one
    #[serde(default = "default_format")]
    pub default_format: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            email_errors: true,
            display_errors: true,
            stream_output: false,
            paging_params: default_paging_params(),
            default_format: default_format(),
        }
    }
}

/// Lenient boolean parsing for environment values.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_paging_params(value: &str) -> Option<(String, String)> {
    let mut parts = value.split(',').map(str::trim);
    let offset = parts.next().filter(|s| !s.is_empty())?;
    let limit = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some((offset.to_string(), limit.to_string()))
}

impl ResourceConfig {
    /// Load configuration from `BRRTR_*` environment variables.
    ///
    /// Unset or unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            email_errors: env_bool("BRRTR_EMAIL_ERRORS", defaults.email_errors),
            display_errors: env_bool("BRRTR_DISPLAY_ERRORS", defaults.display_errors),
            stream_output: env_bool("BRRTR_STREAM_OUTPUT", defaults.stream_output),
            paging_params: env::var("BRRTR_PAGINATION_PARAMS")
                .ok()
                .and_then(|v| parse_paging_params(&v))
                .unwrap_or(defaults.paging_params),
            default_format: env::var("BRRTR_DEFAULT_FORMAT")
                .ok()
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.default_format),
        }
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("invalid resource config YAML")?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read resource config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    #[must_use]
    pub fn with_display_errors(mut self, display_errors: bool) -> Self {
        self.display_errors = display_errors;
        self
    }

    #[must_use]
    pub fn with_email_errors(mut self, email_errors: bool) -> Self {
        self.email_errors = email_errors;
        self
    }

    #[must_use]
    pub fn with_stream_output(mut self, stream_output: bool) -> Self {
        self.stream_output = stream_output;
        self
    }

    #[must_use]
    pub fn with_paging_params(mut self, offset: &str, limit: &str) -> Self {
        self.paging_params = (offset.to_string(), limit.to_string());
        self
    }

    #[must_use]
    pub fn offset_param(&self) -> &str {
        &self.paging_params.0
    }

    #[must_use]
    pub fn limit_param(&self) -> &str {
        &self.paging_params.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_paging_params() {
        assert_eq!(
            parse_paging_params("start, count"),
            Some(("start".to_string(), "count".to_string()))
        );
        assert_eq!(parse_paging_params("start"), None);
        assert_eq!(parse_paging_params("a,b,c"), None);
        assert_eq!(parse_paging_params(",b"), None);
    }

    #[test]
    fn test_yaml_partial_keeps_defaults() {
        let cfg = ResourceConfig::from_yaml_str("stream_output: true\n").unwrap();
        assert!(cfg.stream_output);
        assert!(cfg.email_errors);
        assert!(cfg.display_errors);
        assert_eq!(cfg.offset_param(), "offset");
        assert_eq!(cfg.limit_param(), "limit");
        assert_eq!(cfg.default_format, "json");
    }

    #[test]
    fn test_yaml_paging_params() {
        let cfg =
            ResourceConfig::from_yaml_str("paging_params: [page_offset, page_limit]\n").unwrap();
        assert_eq!(cfg.offset_param(), "page_offset");
        assert_eq!(cfg.limit_param(), "page_limit");
    }

    #[test]
    fn test_yaml_type_error() {
        assert!(ResourceConfig::from_yaml_str("display_errors: [1, 2]\n").is_err());
    }
}
