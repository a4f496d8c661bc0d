//! Port abstraction for account persistence adapters and their errors.
//!
//! The pipeline never mutates persisted state directly; it goes through this
//! port. Uniqueness races that slip past the pre-checks surface here as
//! [`AccountPersistenceError::UniqueViolation`] at commit time.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::account::{Account, AccountId, EmailAddress, Login, ROLE_ADMIN, ROLE_USER};

/// Persistence errors raised by account repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountPersistenceError {
    /// Repository connection could not be established.
    #[error("account repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("account repository query failed: {message}")]
    Query { message: String },
    /// A uniqueness constraint rejected the write at commit time.
    #[error("account uniqueness constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
}

impl AccountPersistenceError {
    /// Create a connection error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with the given message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a unique-violation error naming the violated constraint.
    pub fn unique_violation(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }
}

/// Offset-based page request for listing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

/// Largest accepted page size.
pub const PAGE_SIZE_MAX: u32 = 100;
const PAGE_SIZE_DEFAULT: u32 = 20;

impl PageRequest {
    /// Build a page request, clamping the size into `1..=PAGE_SIZE_MAX`.
    #[must_use]
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, PAGE_SIZE_MAX),
        }
    }

    /// Zero-based page index.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Page size after clamping.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Row offset of the first element on this page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    /// Row limit for this page.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, PAGE_SIZE_DEFAULT)
    }
}

/// Persistence port for account records.
///
/// Read methods are the lookup path handed to precondition checks; write
/// methods are the mutation path. `update` resolves to `Ok(None)` when the
/// target record does not exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fetch an account by its (lower-cased) login.
    async fn find_by_login(
        &self,
        login: &Login,
    ) -> Result<Option<Account>, AccountPersistenceError>;

    /// Fetch an account by its (lower-cased) e-mail address.
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Account>, AccountPersistenceError>;

    /// Fetch an account by identifier.
    async fn find_by_id(
        &self,
        id: &AccountId,
    ) -> Result<Option<Account>, AccountPersistenceError>;

    /// Fetch the pending account holding this activation key.
    async fn find_by_activation_key(
        &self,
        key: &str,
    ) -> Result<Option<Account>, AccountPersistenceError>;

    /// Fetch the account holding this reset key.
    async fn find_by_reset_key(
        &self,
        key: &str,
    ) -> Result<Option<Account>, AccountPersistenceError>;

    /// Insert a new account record.
    async fn create(&self, account: &Account) -> Result<Account, AccountPersistenceError>;

    /// Update an existing account record; `None` when the id is unknown.
    async fn update(&self, account: &Account) -> Result<Option<Account>, AccountPersistenceError>;

    /// Delete the account with this login, if present.
    async fn delete_by_login(&self, login: &Login) -> Result<(), AccountPersistenceError>;

    /// List accounts in the adapter's page order.
    async fn list(&self, page: PageRequest) -> Result<Vec<Account>, AccountPersistenceError>;

    /// List the known authority names.
    async fn authorities(&self) -> Result<Vec<String>, AccountPersistenceError>;
}

/// In-memory repository used by tests and database-less development runs.
///
/// Enforces login/email uniqueness on writes the way the real schema does,
/// so the commit-time constraint-violation path is exercisable without
/// PostgreSQL. Read operations are counted, which lets tests assert that a
/// rejection happened before any lookup ran.
#[derive(Default)]
pub struct FixtureAccountRepository {
    accounts: Mutex<Vec<Account>>,
    lookups: AtomicUsize,
}

impl FixtureAccountRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-populated with the given accounts.
    #[must_use]
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: Mutex::new(accounts.into_iter().collect()),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of read operations performed so far.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of stored accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.lock().len()
    }

    /// Snapshot a stored account by login.
    #[must_use]
    pub fn stored_by_login(&self, login: &Login) -> Option<Account> {
        self.lock().iter().find(|a| &a.login == login).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Account>> {
        match self.accounts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn count_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    fn conflict(
        stored: &[Account],
        candidate: &Account,
        ignore_id: Option<&AccountId>,
    ) -> Option<AccountPersistenceError> {
        for existing in stored {
            if ignore_id == Some(&existing.id) {
                continue;
            }
            if existing.login == candidate.login {
                return Some(AccountPersistenceError::unique_violation("accounts_login_key"));
            }
            if existing.email == candidate.email {
                return Some(AccountPersistenceError::unique_violation("accounts_email_key"));
            }
        }
        None
    }
}

#[async_trait]
impl AccountRepository for FixtureAccountRepository {
    async fn find_by_login(
        &self,
        login: &Login,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        self.count_lookup();
        Ok(self.lock().iter().find(|a| &a.login == login).cloned())
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        self.count_lookup();
        Ok(self.lock().iter().find(|a| &a.email == email).cloned())
    }

    async fn find_by_id(
        &self,
        id: &AccountId,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        self.count_lookup();
        Ok(self.lock().iter().find(|a| &a.id == id).cloned())
    }

    async fn find_by_activation_key(
        &self,
        key: &str,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        self.count_lookup();
        Ok(self
            .lock()
            .iter()
            .find(|a| a.activation_key.as_deref() == Some(key))
            .cloned())
    }

    async fn find_by_reset_key(
        &self,
        key: &str,
    ) -> Result<Option<Account>, AccountPersistenceError> {
        self.count_lookup();
        Ok(self
            .lock()
            .iter()
            .find(|a| a.reset_key.as_deref() == Some(key))
            .cloned())
    }

    async fn create(&self, account: &Account) -> Result<Account, AccountPersistenceError> {
        let mut stored = self.lock();
        if let Some(conflict) = Self::conflict(&stored, account, None) {
            return Err(conflict);
        }
        stored.push(account.clone());
        Ok(account.clone())
    }

    async fn update(&self, account: &Account) -> Result<Option<Account>, AccountPersistenceError> {
        let mut stored = self.lock();
        let Some(position) = stored.iter().position(|a| a.id == account.id) else {
            return Ok(None);
        };
        if let Some(conflict) = Self::conflict(&stored, account, Some(&account.id)) {
            return Err(conflict);
        }
        stored[position] = account.clone();
        Ok(Some(account.clone()))
    }

    async fn delete_by_login(&self, login: &Login) -> Result<(), AccountPersistenceError> {
        self.lock().retain(|a| &a.login != login);
        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<Account>, AccountPersistenceError> {
        let mut accounts = self.lock().clone();
        accounts.sort_by(|a, b| a.login.as_ref().cmp(b.login.as_ref()));
        Ok(accounts
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.size() as usize)
            .collect())
    }

    async fn authorities(&self) -> Result<Vec<String>, AccountPersistenceError> {
        let mut names: BTreeSet<String> =
            BTreeSet::from([ROLE_ADMIN.to_owned(), ROLE_USER.to_owned()]);
        for account in self.lock().iter() {
            names.extend(account.authorities.iter().cloned());
        }
        Ok(names.into_iter().collect())
    }
}
