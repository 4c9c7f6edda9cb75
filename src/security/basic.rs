use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use crate::dispatcher::HandlerResponse;
use crate::security::{AuthenticationStrategy, SecurityRequest, AUTHORIZATION_REQUIRED};

/// Checks a username/password pair against whatever user store the host has.
pub type CredentialVerifier = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Example HTTP Basic strategy.
///
/// Credentials are read from `Authorization: Basic <base64(user:pass)>` and
/// handed to the verifier. Failed callers receive a 401 carrying
/// `WWW-Authenticate: Basic realm="<realm>"`.
pub struct HttpBasicAuthentication {
    realm: String,
    verifier: CredentialVerifier,
}

impl HttpBasicAuthentication {
    pub fn new<F>(realm: impl Into<String>, verifier: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            realm: realm.into(),
            verifier: Arc::new(verifier),
        }
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Decode the `user:password` pair from an Authorization header value.
    pub(crate) fn credentials(header: &str) -> Option<(String, String)> {
        let (scheme, encoded) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = match general_purpose::STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Basic credentials are not valid base64");
                return None;
            }
        };
        let text = String::from_utf8(decoded).ok()?;
        let (user, password) = text.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }
}

impl fmt::Debug for HttpBasicAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBasicAuthentication")
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl AuthenticationStrategy for HttpBasicAuthentication {
    fn is_authenticated(&self, req: &SecurityRequest) -> bool {
        let Some((user, password)) = req
            .get_header("authorization")
            .and_then(Self::credentials)
        else {
            debug!("Basic authentication failed: no usable credentials");
            return false;
        };
        let ok = (self.verifier)(&user, &password);
        if !ok {
            debug!(user = %user, "Basic authentication failed: credentials rejected");
        }
        ok
    }

    fn challenge(&self) -> HandlerResponse {
        let mut resp = HandlerResponse::text(401, AUTHORIZATION_REQUIRED);
        resp.set_header("www-authenticate", format!("Basic realm=\"{}\"", self.realm));
        resp
    }

    fn name(&self) -> &str {
        "basic"
    }
}
