use crate::dispatcher::HandlerResponse;
use crate::security::{AuthenticationStrategy, SecurityRequest, AUTHORIZATION_REQUIRED};

/// Accepts every request. Used when a resource is built without strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthentication;

impl AuthenticationStrategy for NoAuthentication {
    fn is_authenticated(&self, _req: &SecurityRequest) -> bool {
        true
    }

    // Unreachable through the chain since every request authenticates.
    fn challenge(&self) -> HandlerResponse {
        HandlerResponse::text(401, AUTHORIZATION_REQUIRED)
    }

    fn name(&self) -> &str {
        "none"
    }
}
