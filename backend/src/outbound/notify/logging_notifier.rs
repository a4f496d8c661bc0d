//! Tracing-backed `Notifier` adapter.
//!
//! Stands in for mail delivery: notifications land in the structured log
//! stream. The pipeline treats dispatch as fire-and-forget either way, so a
//! real delivery adapter can replace this one without touching the domain.

use async_trait::async_trait;
use tracing::info;

use crate::domain::Account;
use crate::domain::ports::{Notifier, NotifierError};

/// Notifier that records dispatches in the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn account_created(&self, account: &Account) -> Result<(), NotifierError> {
        info!(
            login = %account.login,
            email = %account.email,
            "account creation notification dispatched"
        );
        Ok(())
    }

    async fn password_reset(&self, account: &Account) -> Result<(), NotifierError> {
        info!(
            login = %account.login,
            email = %account.email,
            "password reset notification dispatched"
        );
        Ok(())
    }
}
