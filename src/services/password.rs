//! Password hashing and policy
//!
//! Hashes use Argon2id with the argon2 crate's default parameters and a fresh
//! random salt per hash.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Minimum number of characters a password must have.
pub const MIN_PASSWORD_LENGTH: usize = 7;

/// Message reported when a password fails the complexity policy.
pub const PASSWORD_POLICY_MESSAGE: &str =
    "Password must be seven characters long and contain at least one digit, one upper case letter and one lower case letter";

/// Hash a password using Argon2id.
///
/// Returns the PHC string (algorithm, parameters, salt and hash).
///
/// ```ignore
/// let hash = hash_password("Secret123")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// # Errors
///
/// Returns an error if the stored hash is not a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Complexity policy: at least seven characters with an ASCII upper case
/// letter, an ASCII lower case letter and a digit.
pub fn meets_password_policy(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("Secret123").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"), "Hash should use Argon2id");
    }

    #[test]
    fn test_hash_password_produces_different_hashes() {
        let hash1 = hash_password("Secret123").expect("Failed to hash password");
        let hash2 = hash_password("Secret123").expect("Failed to hash password");
        assert_ne!(hash1, hash2, "Random salts should produce different hashes");
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("Secret123").expect("Failed to hash password");

        assert!(verify_password("Secret123", &hash).unwrap());
        assert!(!verify_password("Secret124", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_password_policy_examples() {
        assert!(meets_password_policy("Secret123"));
        assert!(meets_password_policy("aB3defg"));

        assert!(!meets_password_policy("abc"));
        assert!(!meets_password_policy("aB3def"));
        assert!(!meets_password_policy("secret123"));
        assert!(!meets_password_policy("SECRET123"));
        assert!(!meets_password_policy("SecretPassword"));
    }

    #[test]
    fn test_password_policy_counts_only_ascii_letters() {
        assert!(!meets_password_policy("Ééééé12"));
        assert!(!meets_password_policy("ßBCDEF1"));
        assert!(meets_password_policy("ÉéB1aéé"));
    }

    proptest! {
        #[test]
        fn short_passwords_never_pass(password in "[a-zA-Z0-9]{0,6}") {
            prop_assert!(!meets_password_policy(&password));
        }

        #[test]
        fn passwords_with_every_class_pass(
            upper in "[A-Z]{1,5}",
            lower in "[a-z]{1,5}",
            digits in "[0-9]{5}",
        ) {
            let password = format!("{}{}{}", upper, lower, digits);
            prop_assert!(meets_password_policy(&password));
        }

        #[test]
        fn passwords_without_digits_fail(password in "[a-zA-Z]{7,20}") {
            prop_assert!(!meets_password_policy(&password));
        }
    }
}
