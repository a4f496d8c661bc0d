//! Port for the external credential validator.
//!
//! The gate consumes this capability; it never implements token parsing or
//! signature verification itself.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

/// Identity extracted from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Principal (login) the token was issued to.
    pub principal: String,
    /// Role names granted by the token.
    pub roles: BTreeSet<String>,
}

/// External credential validation capability.
///
/// `None` covers every invalid-credential case (bad signature, expired,
/// malformed claims); the caller cannot and should not distinguish them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate an opaque token and extract the identity it carries.
    async fn validate(&self, token: &str) -> Option<AuthenticatedIdentity>;
}

/// Table-driven validator for tests and database-less development runs.
#[derive(Debug, Default)]
pub struct FixtureTokenValidator {
    tokens: HashMap<String, AuthenticatedIdentity>,
}

impl FixtureTokenValidator {
    /// Create a validator that accepts no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token as valid for the given identity.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: AuthenticatedIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

#[async_trait]
impl TokenValidator for FixtureTokenValidator {
    async fn validate(&self, token: &str) -> Option<AuthenticatedIdentity> {
        self.tokens.get(token).cloned()
    }
}
