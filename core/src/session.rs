//! Ready-made [`SessionResolver`]s.
//!
//! Real deployments plug in their identity provider; these cover fixed
//! identities (tests, single-user tools) and opaque token tables.

use std::collections::HashMap;

use agora_types::{Identity, RequestContext, SessionResolver};

/// Resolves every request to the same identity, or to none.
#[derive(Debug, Clone, Default)]
pub struct StaticSessionResolver {
    identity: Option<Identity>,
}

impl StaticSessionResolver {
    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

impl SessionResolver for StaticSessionResolver {
    fn resolve(&self, _request: &RequestContext) -> Option<Identity> {
        self.identity.clone()
    }
}

/// Maps opaque session tokens to identities.
#[derive(Debug, Clone, Default)]
pub struct TokenSessionResolver {
    sessions: HashMap<String, Identity>,
}

impl TokenSessionResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.sessions.insert(token.into(), identity);
        self
    }
}

impl SessionResolver for TokenSessionResolver {
    fn resolve(&self, request: &RequestContext) -> Option<Identity> {
        let token = request.session_token.as_deref()?;
        self.sessions.get(token).cloned()
    }
}
