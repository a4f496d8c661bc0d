//! Random key material for account activation and password reset.

use rand::Rng;

const KEY_LENGTH: usize = 20;

/// Generate a 20-digit numeric key.
///
/// Activation and reset keys are single-use opaque tokens delivered out of
/// band; digits keep them copy-paste safe in mail clients.
#[must_use]
pub fn random_numeric_key() -> String {
    let mut rng = rand::thread_rng();
    (0..KEY_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
