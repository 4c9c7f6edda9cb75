//! Verb → CRUD operation resolution.

use http::Method;
use std::collections::HashMap;
use std::fmt;

use crate::handler::HandlerCapabilities;
pub use crate::handler::CrudMethod;

/// Extra verb mappings on top of the fixed GET/POST/PUT/DELETE table.
///
/// ```rust
/// use brrtresource::dispatcher::{CrudMethod, MethodOverrides};
/// use http::Method;
///
/// let overrides = MethodOverrides::new().map(Method::PATCH, CrudMethod::Update);
/// assert_eq!(overrides.get(&Method::PATCH), Some(CrudMethod::Update));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MethodOverrides {
    map: HashMap<Method, CrudMethod>,
}

impl MethodOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn map(mut self, verb: Method, method: CrudMethod) -> Self {
        self.insert(verb, method);
        self
    }

    pub fn insert(&mut self, verb: Method, method: CrudMethod) {
        self.map.insert(verb, method);
    }

    #[must_use]
    pub fn get(&self, verb: &Method) -> Option<CrudMethod> {
        self.map.get(verb).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Why a verb could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodError {
    /// The handler does not accept the verb; carries the verbs it does accept
    NotAllowed { allowed: Vec<Method> },
    /// No operation exists for the verb
    NotFound { method: Method },
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodError::NotAllowed { allowed } => {
                let names: Vec<&str> = allowed.iter().map(Method::as_str).collect();
                write!(f, "method not allowed (allowed: {})", names.join(", "))
            }
            MethodError::NotFound { method } => write!(f, "no operation for method {method}"),
        }
    }
}

impl std::error::Error for MethodError {}

/// Resolve a verb against a handler's capabilities.
///
/// The allowed-verb check runs first, so a verb the handler does not accept is
/// always 405 even when no operation would exist for it.
pub fn resolve_method(
    caps: &HandlerCapabilities,
    verb: &Method,
    overrides: &MethodOverrides,
) -> Result<CrudMethod, MethodError> {
    if !caps.allows(verb) {
        return Err(MethodError::NotAllowed {
            allowed: caps.allowed_methods.to_vec(),
        });
    }
    let method = overrides
        .get(verb)
        .or_else(|| CrudMethod::from_verb(verb))
        .ok_or_else(|| MethodError::NotFound {
            method: verb.clone(),
        })?;
    if !caps.implements(method) {
        return Err(MethodError::NotFound {
            method: verb.clone(),
        });
    }
    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> HandlerCapabilities {
        HandlerCapabilities::new()
            .allow(&[Method::GET, Method::PUT, Method::PATCH])
            .implement(&[CrudMethod::Read, CrudMethod::Update])
    }

    #[test]
    fn test_fixed_table() {
        let none = MethodOverrides::new();
        assert_eq!(resolve_method(&caps(), &Method::GET, &none), Ok(CrudMethod::Read));
        assert_eq!(resolve_method(&caps(), &Method::PUT, &none), Ok(CrudMethod::Update));
    }

    #[test]
    fn test_not_allowed_lists_allowed_verbs() {
        let err = resolve_method(&caps(), &Method::DELETE, &MethodOverrides::new()).unwrap_err();
        assert_eq!(
            err,
            MethodError::NotAllowed {
                allowed: vec![Method::GET, Method::PUT, Method::PATCH]
            }
        );
    }

    #[test]
    fn test_patch_without_override_is_not_found() {
        let err = resolve_method(&caps(), &Method::PATCH, &MethodOverrides::new()).unwrap_err();
        assert_eq!(err, MethodError::NotFound { method: Method::PATCH });
    }

    #[test]
    fn test_patch_with_override() {
        let overrides = MethodOverrides::new().map(Method::PATCH, CrudMethod::Update);
        assert_eq!(
            resolve_method(&caps(), &Method::PATCH, &overrides),
            Ok(CrudMethod::Update)
        );
    }

    #[test]
    fn test_allowed_but_unimplemented() {
        let caps = HandlerCapabilities::new()
            .allow(&[Method::GET, Method::POST])
            .implement(&[CrudMethod::Read]);
        let err = resolve_method(&caps, &Method::POST, &MethodOverrides::new()).unwrap_err();
        assert_eq!(err, MethodError::NotFound { method: Method::POST });
    }
}
