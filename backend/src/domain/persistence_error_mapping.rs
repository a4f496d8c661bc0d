//! Shared mapping from account persistence failures to domain errors.
//!
//! Lookup and commit paths map differently: a uniqueness violation during a
//! read is a fault, while the same violation at commit time is the documented
//! race outcome and reports as `InvalidArgument`, matching a pre-check
//! rejection.

use super::error::Error;
use super::ports::AccountPersistenceError;

pub(crate) fn map_lookup_error(error: AccountPersistenceError) -> Error {
    match error {
        AccountPersistenceError::Connection { message } => Error::service_unavailable(message),
        AccountPersistenceError::Query { message } => Error::internal(message),
        AccountPersistenceError::UniqueViolation { constraint } => Error::internal(format!(
            "unexpected constraint violation during lookup: {constraint}"
        )),
    }
}

pub(crate) fn map_commit_error(error: AccountPersistenceError) -> Error {
    match error {
        // A concurrent duplicate slipped past the pre-checks and hit the
        // unique constraint at commit time.
        AccountPersistenceError::UniqueViolation { .. } => Error::invalid_argument("Invalid user"),
        AccountPersistenceError::Connection { message } => Error::service_unavailable(message),
        AccountPersistenceError::Query { message } => Error::internal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(AccountPersistenceError::connection("down"), ErrorCode::ServiceUnavailable)]
    #[case(AccountPersistenceError::query("bad sql"), ErrorCode::Internal)]
    #[case(AccountPersistenceError::unique_violation("accounts_login_key"), ErrorCode::Internal)]
    fn lookup_mapping(#[case] error: AccountPersistenceError, #[case] expected: ErrorCode) {
        assert_eq!(map_lookup_error(error).code(), expected);
    }

    #[rstest]
    #[case(AccountPersistenceError::connection("down"), ErrorCode::ServiceUnavailable)]
    #[case(AccountPersistenceError::query("bad sql"), ErrorCode::Internal)]
    #[case(
        AccountPersistenceError::unique_violation("accounts_login_key"),
        ErrorCode::InvalidArgument
    )]
    fn commit_mapping(#[case] error: AccountPersistenceError, #[case] expected: ErrorCode) {
        assert_eq!(map_commit_error(error).code(), expected);
    }
}
