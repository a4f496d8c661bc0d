//! Port for outbound account notifications.
//!
//! Dispatch is fire-and-forget from the pipeline's perspective: it runs only
//! after a mutation committed, and a dispatch failure never changes the
//! reported outcome of the mutation.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::account::Account;

/// Errors raised by notification adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifierError {
    /// The notification could not be handed to the delivery channel.
    #[error("notification dispatch failed: {message}")]
    Dispatch { message: String },
}

impl NotifierError {
    /// Create a dispatch error with the given message.
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }
}

/// Outbound notification capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// An account was created (self-registration or admin creation).
    async fn account_created(&self, account: &Account) -> Result<(), NotifierError>;

    /// A password reset was requested or completed for this account.
    async fn password_reset(&self, account: &Account) -> Result<(), NotifierError>;
}

/// Recording notifier for tests.
#[derive(Debug, Default)]
pub struct FixtureNotifier {
    created: Mutex<Vec<String>>,
    resets: Mutex<Vec<String>>,
}

impl FixtureNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logins that received a creation notification, in dispatch order.
    #[must_use]
    pub fn created_logins(&self) -> Vec<String> {
        self.created.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Logins that received a reset notification, in dispatch order.
    #[must_use]
    pub fn reset_logins(&self) -> Vec<String> {
        self.resets.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for FixtureNotifier {
    async fn account_created(&self, account: &Account) -> Result<(), NotifierError> {
        if let Ok(mut created) = self.created.lock() {
            created.push(account.login.as_ref().to_owned());
        }
        Ok(())
    }

    async fn password_reset(&self, account: &Account) -> Result<(), NotifierError> {
        if let Ok(mut resets) = self.resets.lock() {
            resets.push(account.login.as_ref().to_owned());
        }
        Ok(())
    }
}
