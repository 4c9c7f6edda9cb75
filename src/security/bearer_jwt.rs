use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dispatcher::HandlerResponse;
use crate::security::{AuthenticationStrategy, SecurityRequest, AUTHORIZATION_REQUIRED};

/// Example Bearer/JWT strategy for tokens in the `Authorization` header or a cookie.
///
/// Tokens have the form `header.payload.signature`; the signature segment must
/// equal the configured value and the payload's whitespace separated `scope`
/// claim must contain every required scope. This is a pre-shared-secret check
/// for internal services, not full JWT verification.
#[derive(Debug, Clone)]
pub struct BearerJwtAuthentication {
    signature: String,
    cookie_name: Option<String>,
    required_scopes: Vec<String>,
}

impl BearerJwtAuthentication {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            cookie_name: None,
            required_scopes: Vec::new(),
        }
    }

    /// Also accept the token from this cookie (checked before the header).
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn require_scopes(mut self, scopes: &[&str]) -> Self {
        self.required_scopes = scopes.iter().map(|s| (*s).to_string()).collect();
        self
    }

    fn extract_token<'a>(&self, req: &SecurityRequest<'a>) -> Option<&'a str> {
        if let Some(name) = &self.cookie_name {
            if let Some(t) = req.get_cookie(name) {
                return Some(t);
            }
        }
        req.get_header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
    }

    fn decode_payload(payload: &str) -> Option<Value> {
        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| general_purpose::STANDARD.decode(payload));
        let bytes = match bytes {
            Ok(b) => b,
            Err(e) => {
                debug!(error = %e, "Bearer token payload is not valid base64");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(error = %e, "Bearer token payload is not valid JSON");
                None
            }
        }
    }

    pub(crate) fn validate_token(&self, token: &str) -> bool {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(sig), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            debug!("Bearer token rejected: malformed token");
            return false;
        };
        if sig != self.signature {
            debug!("Bearer token rejected: invalid signature");
            return false;
        }
        let Some(claims) = Self::decode_payload(payload) else {
            return false;
        };
        let token_scopes = claims.get("scope").and_then(Value::as_str).unwrap_or("");
        let has_all_scopes = self
            .required_scopes
            .iter()
            .all(|s| token_scopes.split_whitespace().any(|ts| ts == s));
        if !has_all_scopes {
            warn!(
                token_scopes = %token_scopes,
                required = ?self.required_scopes,
                "Bearer token rejected: missing required scopes"
            );
        }
        has_all_scopes
    }
}

impl AuthenticationStrategy for BearerJwtAuthentication {
    fn is_authenticated(&self, req: &SecurityRequest) -> bool {
        match self.extract_token(req) {
            Some(token) => self.validate_token(token),
            None => {
                debug!("Bearer authentication failed: no token in header or cookie");
                false
            }
        }
    }

    fn challenge(&self) -> HandlerResponse {
        let mut resp = HandlerResponse::text(401, AUTHORIZATION_REQUIRED);
        resp.set_header("www-authenticate", "Bearer".to_string());
        resp
    }

    fn name(&self) -> &str {
        "bearer_jwt"
    }
}
