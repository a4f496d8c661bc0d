//! Password bounds and hashing helpers.
//!
//! The length bounds are shared by every operation that accepts a new
//! password and are enforced by a pipeline precondition before any
//! persistence lookup runs.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use zeroize::Zeroizing;

use super::error::Error;

/// Inclusive minimum accepted password length.
pub const PASSWORD_MIN_LENGTH: usize = 4;
/// Inclusive maximum accepted password length.
pub const PASSWORD_MAX_LENGTH: usize = 100;

/// Whether a raw password satisfies the shared length bounds.
///
/// # Examples
/// ```
/// use accounts_backend::domain::password_length_valid;
///
/// assert!(!password_length_valid("foo"));
/// assert!(password_length_valid("correct horse"));
/// assert!(!password_length_valid(&"A".repeat(101)));
/// ```
#[must_use]
pub fn password_length_valid(raw: &str) -> bool {
    let length = raw.chars().count();
    (PASSWORD_MIN_LENGTH..=PASSWORD_MAX_LENGTH).contains(&length)
}

/// Raw password material, zeroized on drop.
///
/// Deliberately constructible from out-of-bounds input: the length bounds are
/// a pipeline precondition with a typed rejection, not a parsing failure.
#[derive(Debug, Clone)]
pub struct PlainPassword(Zeroizing<String>);

impl PlainPassword {
    /// Wrap raw password input.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(Zeroizing::new(raw.into()))
    }

    /// Borrow the raw material.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the material satisfies the shared length bounds.
    #[must_use]
    pub fn length_valid(&self) -> bool {
        password_length_valid(self.as_str())
    }
}

/// Hash a password with Argon2 and a fresh random salt.
pub fn hash_password(password: &PlainPassword) -> Result<String, Error> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|err| Error::internal(format!("salt generation failed: {err}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| Error::internal(format!("salt encoding failed: {err}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|err| Error::internal(format!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored Argon2 hash.
///
/// A malformed stored hash verifies as false rather than erroring; the
/// caller cannot act on the distinction.
#[must_use]
pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", false)]
    #[case("foo", false)]
    #[case("abcd", true)]
    #[case("correct horse battery staple", true)]
    fn length_bounds_are_inclusive(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(password_length_valid(raw), expected);
    }

    #[test]
    fn max_boundary_is_inclusive() {
        assert!(password_length_valid(&"A".repeat(PASSWORD_MAX_LENGTH)));
        assert!(!password_length_valid(&"A".repeat(PASSWORD_MAX_LENGTH + 1)));
    }

    #[test]
    fn hash_round_trips_with_verify() {
        let password = PlainPassword::new("s3cret pass");
        let hash = hash_password(&password).expect("hashing succeeds");
        assert!(verify_password(&hash, "s3cret pass"));
        assert!(!verify_password(&hash, "wrong pass"));
    }

    #[test]
    fn distinct_hashes_for_same_password() {
        let password = PlainPassword::new("s3cret pass");
        let first = hash_password(&password).expect("hashing succeeds");
        let second = hash_password(&password).expect("hashing succeeds");
        assert_ne!(first, second, "salts must differ");
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "whatever"));
    }
}
