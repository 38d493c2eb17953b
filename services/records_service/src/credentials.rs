use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(argon2::password_hash::Error),

    #[error("Password hashing failed: {0}")]
    Hashing(argon2::password_hash::Error),
}

/// Compares a presented secret against a stored hash.
pub trait SecretVerifier: Send + Sync {
    /// `Ok(false)` for a well-formed hash that does not match.
    fn compare_secret(&self, plaintext: &str, hash: &str) -> Result<bool, CredentialError>;
}

/// Verifies Argon2 PHC strings, as produced by [`hash_password`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Argon2Verifier;

impl SecretVerifier for Argon2Verifier {
    fn compare_secret(&self, plaintext: &str, hash: &str) -> Result<bool, CredentialError> {
        let parsed_hash = PasswordHash::new(hash).map_err(CredentialError::MalformedHash)?;

        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::MalformedHash(e)),
        }
    }
}

/// Produces a hashed value of the given password to be stored in a persistent storage. The algorithm
/// used for hashing the password is Argon2id.
pub fn hash_password(plaintext: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(CredentialError::Hashing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_hashes() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(Argon2Verifier.compare_secret("correct horse", &hash).unwrap());
        assert!(!Argon2Verifier.compare_secret("battery staple", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        let result = Argon2Verifier.compare_secret("correct horse", "not-a-phc-string");

        assert!(matches!(result, Err(CredentialError::MalformedHash(_))));
    }
}
