//! Cryptogragic logics.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::Argon2 as ArgonConfig;

const TOKEN_BYTES: usize = 32;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
    #[error("password does not match")]
    InvalidPassword,
}

/// Cryptographic manager.
pub struct Crypto {
    pub pwd: PasswordManager,
    pub hasher: Hasher,
}

impl Crypto {
    /// Create a new [`Crypto`].
    pub fn new(config: Option<ArgonConfig>, pepper: impl AsRef<[u8]>) -> Result<Self> {
        let pwd = PasswordManager::new(config)?;
        let hasher = Hasher::new(pepper);

        Ok(Self { pwd, hasher })
    }
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC.
    ///
    /// Parameters are read from the PHC string, so hashes made with another
    /// configuration still verify.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc_hash: &str,
    ) -> Result<()> {
        let parsed =
            PasswordHash::new(phc_hash).map_err(|_| CryptoError::InvalidPassword)?;

        self.argon2()
            .verify_password(password.as_ref(), &parsed)
            .map_err(|_| CryptoError::InvalidPassword)
    }
}

pub struct Hasher(Zeroizing<Vec<u8>>);

impl Hasher {
    /// Create a new [`Hasher`].
    pub fn new(pepper: impl AsRef<[u8]>) -> Self {
        Self(Zeroizing::new(pepper.as_ref().to_vec()))
    }

    /// Digest data into SHA256.
    pub fn digest(&self, data: impl AsRef<[u8]>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        hasher.update(&data);
        let hash = hasher.finalize();

        hex::encode(hash)
    }
}

/// Generate an opaque random token, hex encoded.
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> Option<ArgonConfig> {
        Some(ArgonConfig {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        })
    }

    #[test]
    fn test_sha2() {
        let salt = [0x42; 16];
        let hasher = Hasher::new(salt);

        let plaintext = b"super_secret_data";
        let excepted =
            "ec0797340f6163ddc7398d7eafba6e05a8cb041a3935bbdaef99088917cc8933";

        let hash = hasher.digest(plaintext);
        assert_eq!(hash, excepted)
    }

    #[test]
    fn test_password_roundtrip() {
        let pwd = PasswordManager::new(light()).unwrap();
        let hash = pwd.hash_password("test@123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, "test@123");
        assert!(pwd.verify_password("test@123", &hash).is_ok());
        assert!(matches!(
            pwd.verify_password("test@124", &hash),
            Err(CryptoError::InvalidPassword)
        ));
        assert!(pwd.verify_password("test@123", "not a phc").is_err());
    }

    #[test]
    fn test_random_token() {
        let token = random_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, random_token());
    }
}
