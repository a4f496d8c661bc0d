//! Call-scoped authenticated identity.
//!
//! An identity is established once per call by the authentication gate and
//! travels with that call only — there is no process-wide "current user".
//! Handlers receive it explicitly; concurrent calls can never observe each
//! other's principal.

use std::collections::BTreeSet;

use super::account::ROLE_ANONYMOUS;

/// Authenticated principal with its granted roles, valid for one call.
///
/// # Examples
/// ```
/// use accounts_backend::domain::{CallIdentity, ROLE_ADMIN};
///
/// let identity = CallIdentity::new("alice", [ROLE_ADMIN.to_owned()]);
/// assert!(identity.has_role(ROLE_ADMIN));
/// assert!(!identity.is_anonymous());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallIdentity {
    principal: String,
    roles: BTreeSet<String>,
}

impl CallIdentity {
    /// Build an identity from a principal name and its granted roles.
    pub fn new(principal: impl Into<String>, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            principal: principal.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Principal (login) name of the caller.
    #[must_use]
    pub fn principal(&self) -> &str {
        self.principal.as_str()
    }

    /// Granted role names.
    #[must_use]
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Role-gate predicate used by admin-only operations.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether this identity carries the anonymous sentinel role.
    ///
    /// Anonymous identities are authenticated but never authorized.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.roles.contains(ROLE_ANONYMOUS)
    }
}
