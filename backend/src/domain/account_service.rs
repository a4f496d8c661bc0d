//! Self-service account operations.
//!
//! Every mutating operation is one [`run_pipeline`] invocation with that
//! operation's ordered precondition checks. Uniqueness races that slip past
//! the pre-checks surface from the repository as constraint violations at
//! commit time and are reported as `InvalidArgument`, distinct from
//! unrelated persistence failures.
//!
//! Notification dispatch is post-commit and best effort: failures are logged
//! at `warn` and swallowed, never altering the reported outcome.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::TimeDelta;
use futures_util::FutureExt;
use mockable::Clock;
use tracing::{debug, warn};

use super::account::{Account, AccountId, EmailAddress, Login, default_authorities};
use super::error::Error;
use super::identity::CallIdentity;
use super::keys::random_numeric_key;
use super::password::{PlainPassword, hash_password};
use super::persistence_error_mapping::{map_commit_error, map_lookup_error};
use super::pipeline::{PipelineResult, PreconditionCheck, run_pipeline};
use super::ports::{AccountRepository, Notifier};

/// Reset keys expire this many seconds after issue.
const RESET_KEY_VALIDITY_SECONDS: i64 = 86_400;

/// Self-registration request, normalized at ingress.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub login: Login,
    pub email: EmailAddress,
    pub password: PlainPassword,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub lang_key: Option<String>,
    pub image_url: Option<String>,
    /// Roles the caller asked for. Registration never honours these.
    pub requested_authorities: BTreeSet<String>,
}

/// Profile update for the calling account.
#[derive(Debug, Clone)]
pub struct SaveAccountRequest {
    pub email: EmailAddress,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub lang_key: Option<String>,
    pub image_url: Option<String>,
}

/// Final step of a password reset: the mailed key plus the new password.
#[derive(Debug, Clone)]
pub struct FinishResetRequest {
    pub key: String,
    pub new_password: PlainPassword,
}

/// Domain service for the account self-service operations.
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    /// Create the service over its collaborator ports.
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            notifier,
            clock,
        }
    }

    fn principal_login(identity: &CallIdentity) -> Result<Login, Error> {
        Login::new(identity.principal())
            .map_err(|err| Error::internal(format!("call identity carries an invalid login: {err}")))
    }

    fn login_not_taken_check(&self) -> PreconditionCheck<RegisterRequest> {
        let accounts = Arc::clone(&self.accounts);
        PreconditionCheck::new(
            "login not taken",
            Error::already_exists("Login already in use"),
            move |request: &RegisterRequest| {
                let accounts = Arc::clone(&accounts);
                let login = request.login.clone();
                async move {
                    let existing = accounts
                        .find_by_login(&login)
                        .await
                        .map_err(map_lookup_error)?;
                    Ok(existing.is_none())
                }
                .boxed()
            },
        )
    }

    fn email_not_taken_check(&self) -> PreconditionCheck<RegisterRequest> {
        let accounts = Arc::clone(&self.accounts);
        PreconditionCheck::new(
            "email not taken",
            Error::already_exists("Email already in use"),
            move |request: &RegisterRequest| {
                let accounts = Arc::clone(&accounts);
                let email = request.email.clone();
                async move {
                    let existing = accounts
                        .find_by_email(&email)
                        .await
                        .map_err(map_lookup_error)?;
                    Ok(existing.is_none())
                }
                .boxed()
            },
        )
    }

    /// Register a new account.
    ///
    /// The account is created deactivated with a fresh activation key and the
    /// default user role; requested role elevation is ignored.
    pub async fn register(&self, request: RegisterRequest) -> PipelineResult<Account> {
        debug!(login = %request.login, "registering account");
        let checks = vec![
            PreconditionCheck::sync(
                "password length",
                Error::invalid_argument("Incorrect password"),
                |request: &RegisterRequest| request.password.length_valid(),
            ),
            self.login_not_taken_check(),
            self.email_not_taken_check(),
        ];

        let accounts = Arc::clone(&self.accounts);
        let clock = Arc::clone(&self.clock);
        let notifier = Arc::clone(&self.notifier);
        run_pipeline(
            request,
            checks,
            move |request| async move {
                let now = clock.utc();
                let password_hash = hash_password(&request.password)?;
                let account = Account {
                    id: AccountId::random(),
                    login: request.login,
                    email: request.email,
                    password_hash,
                    first_name: request.first_name,
                    last_name: request.last_name,
                    activated: false,
                    lang_key: request.lang_key,
                    image_url: request.image_url,
                    activation_key: Some(random_numeric_key()),
                    reset_key: None,
                    reset_date: None,
                    authorities: default_authorities(),
                    created_at: now,
                    updated_at: now,
                };
                accounts.create(&account).await.map_err(map_commit_error)
            },
            move |created: &Account| {
                let account = created.clone();
                async move {
                    if let Err(error) = notifier.account_created(&account).await {
                        warn!(%error, login = %account.login, "creation notification failed");
                    }
                }
            },
        )
        .await
    }

    /// Activate a pending registration with its single-use key.
    ///
    /// The key is cleared on success, so replaying it fails the same way an
    /// unknown key does.
    pub async fn activate(&self, key: String) -> PipelineResult<Account> {
        let lookup_accounts = Arc::clone(&self.accounts);
        let checks = vec![PreconditionCheck::new(
            "activation key resolves",
            Error::internal("activation key not found"),
            move |key: &String| {
                let accounts = Arc::clone(&lookup_accounts);
                let key = key.clone();
                async move {
                    let pending = accounts
                        .find_by_activation_key(&key)
                        .await
                        .map_err(map_lookup_error)?;
                    Ok(pending.is_some())
                }
                .boxed()
            },
        )];

        let accounts = Arc::clone(&self.accounts);
        let clock = Arc::clone(&self.clock);
        run_pipeline(
            key,
            checks,
            move |key| async move {
                let mut account = accounts
                    .find_by_activation_key(&key)
                    .await
                    .map_err(map_lookup_error)?
                    .ok_or_else(|| Error::internal("activation key not found"))?;
                account.activated = true;
                account.activation_key = None;
                account.updated_at = clock.utc();
                accounts
                    .update(&account)
                    .await
                    .map_err(map_commit_error)?
                    .ok_or_else(|| Error::internal("account vanished during activation"))
            },
            |_| async {},
        )
        .await
    }

    /// Resolve the calling identity to its account record.
    pub async fn current_account(&self, identity: &CallIdentity) -> Result<Account, Error> {
        let login = Self::principal_login(identity)?;
        self.accounts
            .find_by_login(&login)
            .await
            .map_err(map_lookup_error)?
            .ok_or_else(|| Error::internal("current account not found"))
    }

    /// Update the calling account's profile fields.
    pub async fn save_account(
        &self,
        identity: &CallIdentity,
        request: SaveAccountRequest,
    ) -> PipelineResult<Account> {
        let caller = Self::principal_login(identity)?;

        let email_accounts = Arc::clone(&self.accounts);
        let email_caller = caller.clone();
        let email_free = PreconditionCheck::new(
            "email not used by another identity",
            Error::already_exists("Email already in use"),
            move |request: &SaveAccountRequest| {
                let accounts = Arc::clone(&email_accounts);
                let email = request.email.clone();
                let caller = email_caller.clone();
                async move {
                    let existing = accounts
                        .find_by_email(&email)
                        .await
                        .map_err(map_lookup_error)?;
                    // A record holding this email does not conflict with the
                    // caller's own record.
                    Ok(existing.is_none_or(|account| account.login == caller))
                }
                .boxed()
            },
        );

        let owner_accounts = Arc::clone(&self.accounts);
        let owner_caller = caller.clone();
        let caller_exists = PreconditionCheck::new(
            "caller account exists",
            Error::internal("current account not found"),
            move |_request: &SaveAccountRequest| {
                let accounts = Arc::clone(&owner_accounts);
                let caller = owner_caller.clone();
                async move {
                    let existing = accounts
                        .find_by_login(&caller)
                        .await
                        .map_err(map_lookup_error)?;
                    Ok(existing.is_some())
                }
                .boxed()
            },
        );

        let accounts = Arc::clone(&self.accounts);
        let clock = Arc::clone(&self.clock);
        run_pipeline(
            request,
            vec![email_free, caller_exists],
            move |request| async move {
                let mut account = accounts
                    .find_by_login(&caller)
                    .await
                    .map_err(map_lookup_error)?
                    .ok_or_else(|| Error::internal("current account not found"))?;
                account.email = request.email;
                account.first_name = request.first_name;
                account.last_name = request.last_name;
                account.lang_key = request.lang_key;
                account.image_url = request.image_url;
                account.updated_at = clock.utc();
                accounts
                    .update(&account)
                    .await
                    .map_err(map_commit_error)?
                    .ok_or_else(|| Error::internal("current account not found"))
            },
            |_| async {},
        )
        .await
    }

    /// Change the calling account's password.
    pub async fn change_password(
        &self,
        identity: &CallIdentity,
        new_password: PlainPassword,
    ) -> PipelineResult<Account> {
        let caller = Self::principal_login(identity)?;
        let checks = vec![PreconditionCheck::sync(
            "password length",
            Error::invalid_argument("Incorrect password"),
            |password: &PlainPassword| password.length_valid(),
        )];

        let accounts = Arc::clone(&self.accounts);
        let clock = Arc::clone(&self.clock);
        run_pipeline(
            new_password,
            checks,
            move |password| async move {
                let mut account = accounts
                    .find_by_login(&caller)
                    .await
                    .map_err(map_lookup_error)?
                    .ok_or_else(|| Error::internal("current account not found"))?;
                account.password_hash = hash_password(&password)?;
                account.updated_at = clock.utc();
                accounts
                    .update(&account)
                    .await
                    .map_err(map_commit_error)?
                    .ok_or_else(|| Error::internal("current account not found"))
            },
            |_| async {},
        )
        .await
    }

    /// Issue a reset key for the account registered under this address.
    pub async fn request_password_reset(&self, email: EmailAddress) -> PipelineResult<Account> {
        let lookup_accounts = Arc::clone(&self.accounts);
        let checks = vec![PreconditionCheck::new(
            "email registered",
            Error::invalid_argument("e-mail address not registered"),
            move |email: &EmailAddress| {
                let accounts = Arc::clone(&lookup_accounts);
                let email = email.clone();
                async move {
                    let existing = accounts
                        .find_by_email(&email)
                        .await
                        .map_err(map_lookup_error)?;
                    Ok(existing.is_some_and(|account| account.activated))
                }
                .boxed()
            },
        )];

        let accounts = Arc::clone(&self.accounts);
        let clock = Arc::clone(&self.clock);
        let notifier = Arc::clone(&self.notifier);
        run_pipeline(
            email,
            checks,
            move |email| async move {
                let mut account = accounts
                    .find_by_email(&email)
                    .await
                    .map_err(map_lookup_error)?
                    .ok_or_else(|| Error::internal("account vanished during reset request"))?;
                let now = clock.utc();
                account.reset_key = Some(random_numeric_key());
                account.reset_date = Some(now);
                account.updated_at = now;
                accounts
                    .update(&account)
                    .await
                    .map_err(map_commit_error)?
                    .ok_or_else(|| Error::internal("account vanished during reset request"))
            },
            move |updated: &Account| {
                let account = updated.clone();
                async move {
                    if let Err(error) = notifier.password_reset(&account).await {
                        warn!(%error, login = %account.login, "reset notification failed");
                    }
                }
            },
        )
        .await
    }

    /// Complete a password reset with the mailed key and a new password.
    pub async fn finish_password_reset(
        &self,
        request: FinishResetRequest,
    ) -> PipelineResult<Account> {
        let lookup_accounts = Arc::clone(&self.accounts);
        let lookup_clock = Arc::clone(&self.clock);
        let checks = vec![
            PreconditionCheck::sync(
                "password length",
                Error::invalid_argument("Incorrect password"),
                |request: &FinishResetRequest| request.new_password.length_valid(),
            ),
            PreconditionCheck::new(
                "reset key fresh",
                Error::internal("reset key is invalid or expired"),
                move |request: &FinishResetRequest| {
                    let accounts = Arc::clone(&lookup_accounts);
                    let key = request.key.clone();
                    let now = lookup_clock.utc();
                    async move {
                        let existing = accounts
                            .find_by_reset_key(&key)
                            .await
                            .map_err(map_lookup_error)?;
                        Ok(existing.is_some_and(|account| {
                            account.reset_date.is_some_and(|issued| {
                                issued + TimeDelta::seconds(RESET_KEY_VALIDITY_SECONDS) > now
                            })
                        }))
                    }
                    .boxed()
                },
            ),
        ];

        let accounts = Arc::clone(&self.accounts);
        let clock = Arc::clone(&self.clock);
        let notifier = Arc::clone(&self.notifier);
        run_pipeline(
            request,
            checks,
            move |request| async move {
                let mut account = accounts
                    .find_by_reset_key(&request.key)
                    .await
                    .map_err(map_lookup_error)?
                    .ok_or_else(|| Error::internal("reset key is invalid or expired"))?;
                account.password_hash = hash_password(&request.new_password)?;
                account.reset_key = None;
                account.reset_date = None;
                account.updated_at = clock.utc();
                accounts
                    .update(&account)
                    .await
                    .map_err(map_commit_error)?
                    .ok_or_else(|| Error::internal("account vanished during reset"))
            },
            move |updated: &Account| {
                let account = updated.clone();
                async move {
                    if let Err(error) = notifier.password_reset(&account).await {
                        warn!(%error, login = %account.login, "reset notification failed");
                    }
                }
            },
        )
        .await
    }
}
