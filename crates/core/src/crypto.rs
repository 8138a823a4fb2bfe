//! Secret-handling ports (hashing and reversible encryption).
//!
//! The command side never stores plaintext secrets in events: passwords are
//! hashed, IDP client secrets are encrypted. The concrete algorithms live in
//! the infrastructure crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("hashing failed: {0}")]
    Hash(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl From<CryptoError> for Error {
    fn from(value: CryptoError) -> Self {
        Error::internal(value.to_string())
    }
}

/// Encrypted value as embedded in events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoValue {
    pub algorithm: String,
    pub key_id: String,
    pub crypted: String,
}

/// One-way hashing of user credentials.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, CryptoError>;

    fn verify(&self, encoded: &str, secret: &str) -> Result<bool, CryptoError>;
}

/// Reversible encryption of secrets that must be replayed to third parties.
pub trait SecretEncryptor: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<CryptoValue, CryptoError>;

    fn decrypt(&self, value: &CryptoValue) -> Result<Vec<u8>, CryptoError>;
}

impl<H> SecretHasher for std::sync::Arc<H>
where
    H: SecretHasher + ?Sized,
{
    fn hash(&self, secret: &str) -> Result<String, CryptoError> {
        (**self).hash(secret)
    }

    fn verify(&self, encoded: &str, secret: &str) -> Result<bool, CryptoError> {
        (**self).verify(encoded, secret)
    }
}

impl<E> SecretEncryptor for std::sync::Arc<E>
where
    E: SecretEncryptor + ?Sized,
{
    fn encrypt(&self, plaintext: &[u8]) -> Result<CryptoValue, CryptoError> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, value: &CryptoValue) -> Result<Vec<u8>, CryptoError> {
        (**self).decrypt(value)
    }
}
