//! Password hashing and verification.
//!
//! Argon2id via the `password_hash` PHC string format. Hashing is CPU-bound,
//! so the async entry points run it on the blocking pool instead of the
//! request-accepting workers.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password off the async workers.
///
/// # Errors
/// Returns an error if hashing fails or the blocking task is cancelled.
pub async fn hash_password(plain: &str) -> Result<String> {
    let plain = plain.to_string();
    task::spawn_blocking(move || hash_password_sync(&plain))
        .await
        .context("password hashing task failed")?
}

/// Verify a password off the async workers. Any malformed stored hash
/// verifies as a mismatch.
pub async fn verify_password(hash: &str, plain: &str) -> bool {
    let hash = hash.to_string();
    let plain = plain.to_string();
    task::spawn_blocking(move || verify_password_sync(&hash, &plain))
        .await
        .unwrap_or(false)
}

pub(crate) fn hash_password_sync(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

pub(crate) fn verify_password_sync(hash: &str, plain: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// Check password strength for registration and resets.
///
/// # Errors
/// Returns a client-facing message describing the first failed requirement.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a digit".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() -> Result<()> {
        let hash = hash_password_sync("Password123!")?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password_sync(&hash, "Password123!"));
        assert!(!verify_password_sync(&hash, "password123!"));
        Ok(())
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password_sync("not-a-phc-string", "Password123!"));
        assert!(!verify_password_sync("", "Password123!"));
    }

    #[test]
    fn hashes_are_salted() -> Result<()> {
        let first = hash_password_sync("Password123!")?;
        let second = hash_password_sync("Password123!")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn strength_requirements() {
        assert!(validate_password_strength("Password123!").is_ok());
        assert!(validate_password_strength("Pass1").is_err());
        assert!(validate_password_strength("password123").is_err());
        assert!(validate_password_strength("PASSWORD123").is_err());
        assert!(validate_password_strength("Passwordabc").is_err());
    }

    #[tokio::test]
    async fn async_wrappers_round_trip() -> Result<()> {
        let hash = hash_password("Password123!").await?;
        assert!(verify_password(&hash, "Password123!").await);
        assert!(!verify_password(&hash, "wrong").await);
        Ok(())
    }
}
