//! Account aggregate and its validated field newtypes.
//!
//! Logins and e-mail addresses are normalized to lower case at construction
//! so every uniqueness comparison downstream is case-insensitive by
//! construction rather than by convention.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role granted to administrators.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
/// Role granted to every registered user.
pub const ROLE_USER: &str = "ROLE_USER";
/// Sentinel role for authenticated-but-anonymous identities.
pub const ROLE_ANONYMOUS: &str = "ROLE_ANONYMOUS";

/// Role set assigned to self-registered accounts.
///
/// Registration never honours requested roles; admin elevation through the
/// registration operation is always ignored.
#[must_use]
pub fn default_authorities() -> BTreeSet<String> {
    BTreeSet::from([ROLE_USER.to_owned()])
}

/// Validation errors returned by the field constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyLogin,
    LoginTooLong { max: usize },
    LoginInvalidCharacters,
    EmptyEmail,
    InvalidEmail,
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyLogin => write!(f, "login must not be empty"),
            Self::LoginTooLong { max } => {
                write!(f, "login must be at most {max} characters")
            }
            Self::LoginInvalidCharacters => write!(
                f,
                "login may only contain letters, digits, underscores, dots, dashes, or @",
            ),
            Self::EmptyEmail => write!(f, "email must not be empty"),
            Self::InvalidEmail => write!(f, "email must be a valid address"),
        }
    }
}

impl std::error::Error for AccountValidationError {}

/// Stable account identifier stored as a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum accepted login length.
pub const LOGIN_MAX: usize = 50;

/// Lower-cased login name.
///
/// ## Invariants
/// - non-empty once trimmed, at most [`LOGIN_MAX`] characters
/// - contains only `[a-z0-9_.@-]` after lower-casing
///
/// # Examples
/// ```
/// use accounts_backend::domain::Login;
///
/// let login = Login::new("Alice.Smith").unwrap();
/// assert_eq!(login.as_ref(), "alice.smith");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Login(String);

impl Login {
    /// Validate and construct a login, normalizing to lower case.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AccountValidationError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AccountValidationError::EmptyLogin);
        }
        if normalized.chars().count() > LOGIN_MAX {
            return Err(AccountValidationError::LoginTooLong { max: LOGIN_MAX });
        }
        let valid = normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_.@-".contains(c));
        if !valid {
            return Err(AccountValidationError::LoginInvalidCharacters);
        }
        Ok(Self(normalized))
    }
}

impl AsRef<str> for Login {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Login> for String {
    fn from(value: Login) -> Self {
        value.0
    }
}

impl TryFrom<String> for Login {
    type Error = AccountValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Lower-cased e-mail address.
///
/// ## Invariants
/// - non-empty once trimmed
/// - has non-empty local and domain parts around a single separating `@`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and construct an address, normalizing to lower case.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AccountValidationError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AccountValidationError::EmptyEmail);
        }
        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(AccountValidationError::InvalidEmail);
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(AccountValidationError::InvalidEmail);
        }
        Ok(Self(normalized))
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = AccountValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Persisted account record.
///
/// The pipeline treats most fields as opaque; predicates only inspect login,
/// email, activation state, and the key/expiry material.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub login: Login,
    pub email: EmailAddress,
    /// Argon2 hash of the current password. Never projected outward.
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub activated: bool,
    pub lang_key: Option<String>,
    pub image_url: Option<String>,
    /// Single-use key consumed by activation.
    pub activation_key: Option<String>,
    /// Single-use key consumed by password reset. Never projected outward.
    pub reset_key: Option<String>,
    pub reset_date: Option<DateTime<Utc>>,
    pub authorities: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
