//! Domain types, services, and ports.
//!
//! The heart of the crate: the authentication identity model, the
//! short-circuiting validation pipeline, and the account/user services built
//! on top of it. Everything here is transport agnostic; inbound adapters map
//! domain errors to their protocol and outbound adapters implement the ports.

pub mod account;
mod account_service;
pub mod error;
mod identity;
mod keys;
pub mod password;
mod persistence_error_mapping;
pub mod pipeline;
pub mod ports;
mod trace_id;
mod user_admin_service;

pub use self::account::{
    Account, AccountId, AccountValidationError, EmailAddress, LOGIN_MAX, Login, ROLE_ADMIN,
    ROLE_ANONYMOUS, ROLE_USER, default_authorities,
};
pub use self::account_service::{
    AccountService, FinishResetRequest, RegisterRequest, SaveAccountRequest,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::identity::CallIdentity;
pub use self::keys::random_numeric_key;
pub use self::password::{
    PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH, PlainPassword, hash_password,
    password_length_valid, verify_password,
};
pub use self::pipeline::{PipelineResult, PreconditionCheck, run_pipeline};
pub use self::trace_id::TraceId;
pub use self::user_admin_service::{CreateUserRequest, UpdateUserRequest, UserAdminService};

/// Convenient result alias shared by handlers and services.
pub type ApiResult<T> = Result<T, Error>;
