//! JWT-backed implementation of the `TokenValidator` port.
//!
//! Tokens are HS512-signed with the server's shared secret and carry the
//! principal in `sub` plus a comma-separated role list in `auth`. Every
//! validation failure — bad signature, expiry, malformed claims — collapses
//! to "no identity"; the gate owns the decision of what that means for the
//! call.

use std::collections::BTreeSet;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tracing::debug;

use crate::domain::ports::{AuthenticatedIdentity, TokenValidator};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    auth: String,
}

/// Validator for HS512-signed bearer tokens.
pub struct JwtTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenValidator {
    /// Build a validator over the shared signing secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS512),
        }
    }
}

#[async_trait]
impl TokenValidator for JwtTokenValidator {
    async fn validate(&self, token: &str) -> Option<AuthenticatedIdentity> {
        let data = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data,
            Err(err) => {
                debug!(error = %err, "bearer token failed validation");
                return None;
            }
        };
        let roles: BTreeSet<String> = data
            .claims
            .auth
            .split(',')
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        Some(AuthenticatedIdentity {
            principal: data.claims.sub,
            roles,
        })
    }
}
