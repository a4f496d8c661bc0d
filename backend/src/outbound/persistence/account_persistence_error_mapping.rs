//! Shared mapping from pool and Diesel failures to port errors.

use tracing::debug;

use crate::domain::ports::AccountPersistenceError;

use super::pool::PoolError;

/// Map pool checkout/build failures to the port's connection error.
pub(super) fn map_pool_error(error: PoolError) -> AccountPersistenceError {
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    AccountPersistenceError::connection(message)
}

/// Map Diesel failures to port errors, preserving unique violations.
pub(super) fn map_diesel_error(error: diesel::result::Error) -> AccountPersistenceError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            AccountPersistenceError::unique_violation(
                info.constraint_name().unwrap_or("unique constraint").to_owned(),
            )
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            AccountPersistenceError::connection("database connection error")
        }
        DieselError::NotFound => AccountPersistenceError::query("record not found"),
        _ => AccountPersistenceError::query("database error"),
    }
}
