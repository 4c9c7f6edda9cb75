//! Authenticator chain.
//!
//! Runs the configured strategies in order and decides who serves the request:
//!
//! 1. the first strategy that accepts the request wins and later strategies are
//!    not consulted; the bound handler serves it with its declared anonymity
//! 2. otherwise, when an anonymous handler variant exists and allows the verb,
//!    it serves the request anonymously
//! 3. otherwise the first strategy's challenge answers the request
//!
//! An empty strategy list authenticates everyone.

use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::handler::Handler;
use crate::security::{AuthenticationStrategy, SecurityRequest};

/// Who serves a request.
pub enum AuthOutcome {
    /// A strategy accepted the credentials
    Authenticated {
        handler: Arc<dyn Handler>,
        /// The handler's declared anonymity
        anonymous: bool,
    },
    /// No strategy accepted the credentials; the anonymous variant serves the verb
    Anonymous(Arc<dyn Handler>),
    /// Nobody may serve the request; answer with this strategy's challenge
    Challenge(Arc<dyn AuthenticationStrategy>),
}

impl AuthOutcome {
    /// Handler selected for the request, if any.
    #[must_use]
    pub fn handler(&self) -> Option<&Arc<dyn Handler>> {
        match self {
            AuthOutcome::Authenticated { handler, .. } | AuthOutcome::Anonymous(handler) => {
                Some(handler)
            }
            AuthOutcome::Challenge(_) => None,
        }
    }

    /// Anonymity of the selected handler; `None` for a challenge.
    #[must_use]
    pub fn is_anonymous(&self) -> Option<bool> {
        match self {
            AuthOutcome::Authenticated { anonymous, .. } => Some(*anonymous),
            AuthOutcome::Anonymous(_) => Some(true),
            AuthOutcome::Challenge(_) => None,
        }
    }
}

impl fmt::Debug for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOutcome::Authenticated { anonymous, .. } => f
                .debug_struct("Authenticated")
                .field("anonymous", anonymous)
                .finish_non_exhaustive(),
            AuthOutcome::Anonymous(_) => f.write_str("Anonymous(..)"),
            AuthOutcome::Challenge(strategy) => {
                f.debug_tuple("Challenge").field(&strategy.name()).finish()
            }
        }
    }
}

/// Pick the handler (or challenge) for a request.
pub fn authenticate(
    strategies: &[Arc<dyn AuthenticationStrategy>],
    handler: &Arc<dyn Handler>,
    anonymous: Option<&Arc<dyn Handler>>,
    req: &SecurityRequest,
    verb: &Method,
) -> AuthOutcome {
    let authenticated = |handler: &Arc<dyn Handler>| AuthOutcome::Authenticated {
        handler: Arc::clone(handler),
        anonymous: handler.capabilities().is_anonymous,
    };

    let Some(first) = strategies.first() else {
        return authenticated(handler);
    };

    for strategy in strategies {
        if strategy.is_authenticated(req) {
            debug!(strategy = %strategy.name(), "Request authenticated");
            return authenticated(handler);
        }
    }

    if let Some(anon) = anonymous {
        if anon.capabilities().allows(verb) {
            debug!(verb = %verb, "Falling back to anonymous handler");
            return AuthOutcome::Anonymous(Arc::clone(anon));
        }
        debug!(verb = %verb, "Anonymous handler does not allow verb");
    }

    debug!(strategy = %first.name(), "No strategy authenticated request, challenging");
    AuthOutcome::Challenge(Arc::clone(first))
}
