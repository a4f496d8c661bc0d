//! Administrative user management operations.
//!
//! Create and update follow the same pipeline contract as the self-service
//! operations; the uniqueness checks for update exclude the record being
//! updated itself. Listing authorities is the one role-gated operation: a
//! single-check pipeline whose predicate is the pure role gate.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::FutureExt;
use mockable::Clock;
use tracing::{debug, warn};

use super::account::{
    Account, AccountId, EmailAddress, Login, ROLE_ADMIN, default_authorities,
};
use super::error::Error;
use super::identity::CallIdentity;
use super::keys::random_numeric_key;
use super::password::{PlainPassword, hash_password};
use super::persistence_error_mapping::{map_commit_error, map_lookup_error};
use super::pipeline::{PipelineResult, PreconditionCheck, run_pipeline};
use super::ports::{AccountRepository, Notifier, PageRequest};

/// Admin request to create a user record.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    /// Must be absent: new users cannot arrive with an identifier.
    pub id: Option<AccountId>,
    pub login: Login,
    pub email: EmailAddress,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub lang_key: Option<String>,
    pub image_url: Option<String>,
    pub authorities: BTreeSet<String>,
}

/// Admin request to update an existing user record.
#[derive(Debug, Clone)]
pub struct UpdateUserRequest {
    pub id: AccountId,
    pub login: Login,
    pub email: EmailAddress,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub lang_key: Option<String>,
    pub image_url: Option<String>,
    pub activated: bool,
    pub authorities: BTreeSet<String>,
}

/// Domain service for admin-only user management.
pub struct UserAdminService {
    accounts: Arc<dyn AccountRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl UserAdminService {
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

    /// Create a user record on behalf of an administrator.
    ///
    /// The account is created activated with a reset key already issued, so
    /// the new user picks their own password through the reset flow.
    pub async fn create_user(&self, request: CreateUserRequest) -> PipelineResult<Account> {
        debug!(login = %request.login, "admin creating user");

        let login_accounts = Arc::clone(&self.accounts);
        let email_accounts = Arc::clone(&self.accounts);
        let checks = vec![
            PreconditionCheck::sync(
                "no pre-supplied id",
                Error::invalid_argument("A new user cannot already have an ID"),
                |request: &CreateUserRequest| request.id.is_none(),
            ),
            PreconditionCheck::new(
                "login not taken",
                Error::already_exists("Login already in use"),
                move |request: &CreateUserRequest| {
                    let accounts = Arc::clone(&login_accounts);
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
            ),
            PreconditionCheck::new(
                "email not taken",
                Error::already_exists("Email already in use"),
                move |request: &CreateUserRequest| {
                    let accounts = Arc::clone(&email_accounts);
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
            ),
        ];

        let accounts = Arc::clone(&self.accounts);
        let clock = Arc::clone(&self.clock);
        let notifier = Arc::clone(&self.notifier);
        run_pipeline(
            request,
            checks,
            move |request| async move {
                let now = clock.utc();
                // The user never learns this placeholder; they set their own
                // password through the reset key below.
                let placeholder = PlainPassword::new(random_numeric_key());
                let authorities = if request.authorities.is_empty() {
                    default_authorities()
                } else {
                    request.authorities
                };
                let account = Account {
                    id: AccountId::random(),
                    login: request.login,
                    email: request.email,
                    password_hash: hash_password(&placeholder)?,
                    first_name: request.first_name,
                    last_name: request.last_name,
                    activated: true,
                    lang_key: request.lang_key,
                    image_url: request.image_url,
                    activation_key: None,
                    reset_key: Some(random_numeric_key()),
                    reset_date: Some(now),
                    authorities,
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

    /// Update a user record on behalf of an administrator.
    ///
    /// Uniqueness checks exclude the record being updated: a record does not
    /// conflict with itself.
    pub async fn update_user(&self, request: UpdateUserRequest) -> PipelineResult<Account> {
        debug!(login = %request.login, id = %request.id, "admin updating user");

        let email_accounts = Arc::clone(&self.accounts);
        let login_accounts = Arc::clone(&self.accounts);
        let checks = vec![
            PreconditionCheck::new(
                "email not used by a different id",
                Error::already_exists("Email already in use"),
                move |request: &UpdateUserRequest| {
                    let accounts = Arc::clone(&email_accounts);
                    let email = request.email.clone();
                    let id = request.id;
                    async move {
                        let existing = accounts
                            .find_by_email(&email)
                            .await
                            .map_err(map_lookup_error)?;
                        Ok(existing.is_none_or(|account| account.id == id))
                    }
                    .boxed()
                },
            ),
            PreconditionCheck::new(
                "login not used by a different id",
                Error::already_exists("Login already in use"),
                move |request: &UpdateUserRequest| {
                    let accounts = Arc::clone(&login_accounts);
                    let login = request.login.clone();
                    let id = request.id;
                    async move {
                        let existing = accounts
                            .find_by_login(&login)
                            .await
                            .map_err(map_lookup_error)?;
                        Ok(existing.is_none_or(|account| account.id == id))
                    }
                    .boxed()
                },
            ),
        ];

        let accounts = Arc::clone(&self.accounts);
        let clock = Arc::clone(&self.clock);
        run_pipeline(
            request,
            checks,
            move |request| async move {
                let mut account = accounts
                    .find_by_id(&request.id)
                    .await
                    .map_err(map_lookup_error)?
                    .ok_or_else(|| Error::not_found("User not found"))?;
                account.login = request.login;
                account.email = request.email;
                account.first_name = request.first_name;
                account.last_name = request.last_name;
                account.lang_key = request.lang_key;
                account.image_url = request.image_url;
                account.activated = request.activated;
                account.authorities = request.authorities;
                account.updated_at = clock.utc();
                accounts
                    .update(&account)
                    .await
                    .map_err(map_commit_error)?
                    .ok_or_else(|| Error::not_found("User not found"))
            },
            |_| async {},
        )
        .await
    }

    /// Delete the user with this login. Deleting an absent login is a no-op.
    pub async fn delete_user(&self, login: &Login) -> Result<(), Error> {
        self.accounts
            .delete_by_login(login)
            .await
            .map_err(map_commit_error)?;
        debug!(%login, "admin deleted user");
        Ok(())
    }

    /// Fetch a user record by login.
    pub async fn get_user(&self, login: &Login) -> Result<Account, Error> {
        self.accounts
            .find_by_login(login)
            .await
            .map_err(map_lookup_error)?
            .ok_or_else(|| Error::not_found("User not found"))
    }

    /// List user records in the repository's page order.
    pub async fn list_users(&self, page: PageRequest) -> Result<Vec<Account>, Error> {
        self.accounts.list(page).await.map_err(map_lookup_error)
    }

    /// List every known authority name. Admin only.
    ///
    /// A single-check pipeline: the role gate is the one precondition, and it
    /// short-circuits with `PermissionDenied` exactly like any other check.
    pub async fn list_authorities(&self, identity: &CallIdentity) -> PipelineResult<Vec<String>> {
        let checks = vec![PreconditionCheck::sync(
            "caller has admin role",
            Error::permission_denied("admin role required"),
            |identity: &CallIdentity| identity.has_role(ROLE_ADMIN),
        )];

        let accounts = Arc::clone(&self.accounts);
        run_pipeline(
            identity.clone(),
            checks,
            move |_identity| async move { accounts.authorities().await.map_err(map_lookup_error) },
            |_| async {},
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::ROLE_USER;
    use crate::domain::error::ErrorCode;
    use crate::domain::ports::{FixtureAccountRepository, FixtureNotifier};
    use chrono::{DateTime, Local, Utc};

    struct FixtureClock(DateTime<Utc>);

    impl Clock for FixtureClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    struct Harness {
        accounts: Arc<FixtureAccountRepository>,
        notifier: Arc<FixtureNotifier>,
        service: UserAdminService,
    }

    fn harness(accounts: FixtureAccountRepository) -> Harness {
        let accounts = Arc::new(accounts);
        let notifier = Arc::new(FixtureNotifier::new());
        let accounts_port: Arc<dyn AccountRepository> = accounts.clone();
        let notifier_port: Arc<dyn Notifier> = notifier.clone();
        let service =
            UserAdminService::new(accounts_port, notifier_port, Arc::new(FixtureClock(fixed_now())));
        Harness {
            accounts,
            notifier,
            service,
        }
    }

    fn stored_account(login: &str, email: &str) -> Account {
        Account {
            id: AccountId::random(),
            login: Login::new(login).expect("valid login"),
            email: EmailAddress::new(email).expect("valid email"),
            password_hash: "$argon2$fixture".to_owned(),
            first_name: None,
            last_name: None,
            activated: true,
            lang_key: None,
            image_url: None,
            activation_key: None,
            reset_key: None,
            reset_date: None,
            authorities: default_authorities(),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    fn create_request(login: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            id: None,
            login: Login::new(login).expect("valid login"),
            email: EmailAddress::new(email).expect("valid email"),
            first_name: None,
            last_name: None,
            lang_key: None,
            image_url: None,
            authorities: BTreeSet::new(),
        }
    }

    fn admin() -> CallIdentity {
        CallIdentity::new("admin", [ROLE_ADMIN.to_owned(), ROLE_USER.to_owned()])
    }

    fn plain_user() -> CallIdentity {
        CallIdentity::new("user", [ROLE_USER.to_owned()])
    }

    #[tokio::test]
    async fn create_user_rejects_pre_supplied_id_before_any_lookup() {
        let h = harness(FixtureAccountRepository::new());
        let mut request = create_request("newuser", "newuser@example.com");
        request.id = Some(AccountId::random());

        let err = h.service.create_user(request).await.expect_err("id must reject");
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(err.message(), "A new user cannot already have an ID");
        assert_eq!(h.accounts.lookup_count(), 0);
    }

    #[tokio::test]
    async fn second_create_with_same_email_fails_and_leaves_count_unchanged() {
        let h = harness(FixtureAccountRepository::new());

        h.service
            .create_user(create_request("first", "shared@example.com"))
            .await
            .expect("first create succeeds");
        assert_eq!(h.accounts.account_count(), 1);

        let err = h
            .service
            .create_user(create_request("second", "shared@example.com"))
            .await
            .expect_err("duplicate email must reject");
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert_eq!(err.message(), "Email already in use");
        assert_eq!(h.accounts.account_count(), 1, "row count unchanged");
    }

    #[tokio::test]
    async fn create_user_defaults_roles_and_issues_reset_key() {
        let h = harness(FixtureAccountRepository::new());

        let created = h
            .service
            .create_user(create_request("newuser", "newuser@example.com"))
            .await
            .expect("create succeeds");

        assert!(created.activated);
        assert_eq!(created.authorities, default_authorities());
        assert!(created.reset_key.is_some());
        assert_eq!(created.reset_date, Some(fixed_now()));
        assert_eq!(h.notifier.created_logins(), vec!["newuser".to_owned()]);
    }

    fn update_request(existing: &Account) -> UpdateUserRequest {
        UpdateUserRequest {
            id: existing.id,
            login: existing.login.clone(),
            email: existing.email.clone(),
            first_name: existing.first_name.clone(),
            last_name: existing.last_name.clone(),
            lang_key: existing.lang_key.clone(),
            image_url: existing.image_url.clone(),
            activated: existing.activated,
            authorities: existing.authorities.clone(),
        }
    }

    #[tokio::test]
    async fn update_user_with_own_email_never_conflicts() {
        let alice = stored_account("alice", "alice@example.com");
        let h = harness(FixtureAccountRepository::with_accounts([alice.clone()]));

        let mut request = update_request(&alice);
        request.first_name = Some("Ada".to_owned());

        let updated = h
            .service
            .update_user(request)
            .await
            .expect("own unchanged email never conflicts");
        assert_eq!(updated.first_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn update_user_rejects_email_held_by_different_id() {
        let alice = stored_account("alice", "alice@example.com");
        let bob = stored_account("bob", "bob@example.com");
        let h = harness(FixtureAccountRepository::with_accounts([alice.clone(), bob]));

        let mut request = update_request(&alice);
        request.email = EmailAddress::new("bob@example.com").expect("valid email");

        let err = h
            .service
            .update_user(request)
            .await
            .expect_err("foreign email must conflict");
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn update_user_rejects_login_held_by_different_id() {
        let alice = stored_account("alice", "alice@example.com");
        let bob = stored_account("bob", "bob@example.com");
        let h = harness(FixtureAccountRepository::with_accounts([alice.clone(), bob]));

        let mut request = update_request(&alice);
        request.login = Login::new("bob").expect("valid login");

        let err = h
            .service
            .update_user(request)
            .await
            .expect_err("foreign login must conflict");
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert_eq!(err.message(), "Login already in use");
    }

    #[tokio::test]
    async fn update_user_with_unknown_id_is_not_found() {
        let h = harness(FixtureAccountRepository::new());
        let ghost = stored_account("ghost", "ghost@example.com");

        let err = h
            .service
            .update_user(update_request(&ghost))
            .await
            .expect_err("unknown id must fail");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn delete_user_removes_record_and_tolerates_absent_login() {
        let h = harness(FixtureAccountRepository::with_accounts([stored_account(
            "alice",
            "alice@example.com",
        )]));
        let login = Login::new("alice").expect("valid login");

        h.service.delete_user(&login).await.expect("delete succeeds");
        assert_eq!(h.accounts.account_count(), 0);

        h.service
            .delete_user(&login)
            .await
            .expect("second delete is a no-op");
    }

    #[tokio::test]
    async fn get_user_maps_absence_to_not_found() {
        let h = harness(FixtureAccountRepository::new());
        let err = h
            .service
            .get_user(&Login::new("ghost").expect("valid login"))
            .await
            .expect_err("absent login must fail");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn list_authorities_requires_admin_role() {
        let h = harness(FixtureAccountRepository::new());

        let err = h
            .service
            .list_authorities(&plain_user())
            .await
            .expect_err("plain users are denied");
        assert_eq!(err.code(), ErrorCode::PermissionDenied);

        let names = h
            .service
            .list_authorities(&admin())
            .await
            .expect("admins may list");
        assert!(names.contains(&ROLE_ADMIN.to_owned()));
        assert!(names.contains(&ROLE_USER.to_owned()));
    }

    #[tokio::test]
    async fn list_users_preserves_repository_page_order() {
        let h = harness(FixtureAccountRepository::with_accounts([
            stored_account("carol", "carol@example.com"),
            stored_account("alice", "alice@example.com"),
        ]));

        let page = h
            .service
            .list_users(PageRequest::new(0, 10))
            .await
            .expect("list succeeds");
        let logins: Vec<&str> = page.iter().map(|a| a.login.as_ref()).collect();
        assert_eq!(logins, ["alice", "carol"]);
    }
}
