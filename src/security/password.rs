//! Password hashing and verification using Argon2id
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

use crate::error::{AppError, Result};

/// Hash verified when the username does not exist, so a login for an
/// unknown account costs the same as one with a wrong password.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy-password-for-timing", &salt)
        .ok()
        .map(|hash| hash.to_string())
});

/// Compute the dummy hash up front so the first unknown-user login does not
/// pay for hashing on top of verification.
pub fn prepare_dummy_hash() {
    Lazy::force(&DUMMY_HASH);
}

#[cfg(test)]
pub(crate) fn dummy_hash_ready() -> bool {
    Lazy::get(&DUMMY_HASH).is_some()
}

/// Hash a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?
        .to_string())
}

/// Verify a password against its PHC hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(anyhow::anyhow!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Verify against the stored hash when there is one, otherwise burn the same
/// amount of work on the dummy hash and report a mismatch.
pub fn verify_password_or_dummy(password: &str, password_hash: Option<&str>) -> Result<bool> {
    match password_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            Ok(false)
        }
    }
}
