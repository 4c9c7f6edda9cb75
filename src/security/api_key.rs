use std::collections::HashSet;

use tracing::debug;

use crate::dispatcher::HandlerResponse;
use crate::security::{AuthenticationStrategy, SecurityRequest, AUTHORIZATION_REQUIRED};

/// Where an API key is carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header(String),
    Query(String),
    Cookie(String),
}

/// Example strategy: static API key check against a fixed key set.
#[derive(Debug, Clone)]
pub struct ApiKeyAuthentication {
    location: ApiKeyLocation,
    keys: HashSet<String>,
}

impl ApiKeyAuthentication {
    /// Keys read from the named header (the common `x-api-key` setup).
    pub fn header<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ApiKeyLocation::Header(name.into()), keys)
    }

    pub fn new<I, S>(location: ApiKeyLocation, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            location,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    fn extract<'a>(&self, req: &SecurityRequest<'a>) -> Option<&'a str> {
        match &self.location {
            ApiKeyLocation::Header(name) => req.get_header(name),
            ApiKeyLocation::Query(name) => req.get_query(name),
            ApiKeyLocation::Cookie(name) => req.get_cookie(name),
        }
    }
}

impl AuthenticationStrategy for ApiKeyAuthentication {
    fn is_authenticated(&self, req: &SecurityRequest) -> bool {
        match self.extract(req) {
            Some(key) if self.keys.contains(key) => true,
            Some(_) => {
                debug!(location = ?self.location, "API key rejected");
                false
            }
            None => {
                debug!(location = ?self.location, "API key missing");
                false
            }
        }
    }

    fn challenge(&self) -> HandlerResponse {
        HandlerResponse::text(401, AUTHORIZATION_REQUIRED)
    }

    fn name(&self) -> &str {
        "api_key"
    }
}
