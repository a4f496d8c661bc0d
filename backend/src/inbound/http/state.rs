//! Shared HTTP adapter state.
//!
//! Handlers receive this bundle via `actix_web::web::Data`, so they depend
//! only on the domain services and the validator port and stay testable
//! without I/O.

use std::sync::Arc;

use crate::domain::ports::TokenValidator;
use crate::domain::{AccountService, UserAdminService};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub accounts: Arc<AccountService>,
    pub users: Arc<UserAdminService>,
    pub tokens: Arc<dyn TokenValidator>,
}

impl HttpState {
    /// Bundle the services and validator consumed by the HTTP surface.
    pub fn new(
        accounts: Arc<AccountService>,
        users: Arc<UserAdminService>,
        tokens: Arc<dyn TokenValidator>,
    ) -> Self {
        Self {
            accounts,
            users,
            tokens,
        }
    }
}
