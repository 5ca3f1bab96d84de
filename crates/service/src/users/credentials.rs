use argon2::{
    password_hash::{self, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, PasswordHash, Version,
};
use rand::rngs::OsRng;

use crate::errors::ServiceError;

/// One-way password hashing with a fresh random salt per hash.
#[derive(Clone)]
pub struct CredentialHasher {
    argon: Argon2<'static>,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self { argon: Argon2::default() }
    }
}

impl CredentialHasher {
    /// Argon2id with explicit cost parameters.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, ServiceError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| ServiceError::Credential(e.to_string()))?;
        Ok(Self { argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
    }

    /// Hash `plaintext` into a PHC string carrying salt and parameters.
    pub fn hash(&self, plaintext: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| ServiceError::Credential(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Recompute the hash of `plaintext` with the salt and parameters stored
    /// in `stored` and compare. Never recovers the plaintext.
    pub fn verify(&self, plaintext: &str, stored: &str) -> Result<bool, ServiceError> {
        let parsed = PasswordHash::new(stored).map_err(|e| ServiceError::Credential(e.to_string()))?;
        match self.argon.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ServiceError::Credential(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialHasher {
        CredentialHasher::new(64, 1, 1).unwrap()
    }

    #[test]
    fn hash_and_verify() {
        let hasher = cheap();
        let hash = hasher.hash("secret").unwrap();
        assert_ne!(hash, "secret");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret", &hash).unwrap());
        assert!(!hasher.verify("wrong", &hash).unwrap());
    }

    #[test]
    fn salts_differ_per_hash() {
        let hasher = cheap();
        assert_ne!(hasher.hash("secret").unwrap(), hasher.hash("secret").unwrap());
    }

    #[test]
    fn verify_uses_params_from_stored_hash() {
        let stored = cheap().hash("secret").unwrap();
        // a hasher with other costs still checks against the stored ones
        let other = CredentialHasher::new(128, 2, 1).unwrap();
        assert!(other.verify("secret", &stored).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let err = cheap().verify("secret", "plaintext-not-a-hash").unwrap_err();
        assert!(matches!(err, ServiceError::Credential(_)));
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(CredentialHasher::new(1, 1, 1).is_err());
    }
}
