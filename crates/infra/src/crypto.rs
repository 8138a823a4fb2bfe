//! Reference secret adapters: salted SHA-256 hashing and AES-256-GCM.

use std::fmt;

use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce, aead::Aead};
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use warden_core::{CryptoError, CryptoValue, SecretEncryptor, SecretHasher};

const HASH_SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const AES_ALGORITHM: &str = "aes-256-gcm";

/// Random URL-safe token of `len` bytes of entropy.
pub fn random_token(len: usize) -> Result<String, CryptoError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| CryptoError::Encrypt(format!("token generation failed: {err}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Salted SHA-256 password hashing, encoded as `sha256$<salt>$<digest>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256SecretHasher;

impl Sha256SecretHasher {
    fn digest(salt: &[u8], secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl SecretHasher for Sha256SecretHasher {
    fn hash(&self, secret: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|err| CryptoError::Hash(format!("salt generation failed: {err}")))?;
        let digest = Self::digest(&salt, secret);
        Ok(format!(
            "{HASH_SCHEME}${}${}",
            STANDARD.encode(salt),
            STANDARD.encode(digest)
        ))
    }

    fn verify(&self, encoded: &str, secret: &str) -> Result<bool, CryptoError> {
        let mut parts = encoded.splitn(3, '$');
        let (Some(scheme), Some(salt), Some(digest)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::Hash("malformed hash".to_string()));
        };
        if scheme != HASH_SCHEME {
            return Err(CryptoError::Hash(format!("unsupported scheme '{scheme}'")));
        }
        let salt = STANDARD
            .decode(salt)
            .map_err(|err| CryptoError::Hash(format!("invalid salt: {err}")))?;
        let expected = STANDARD
            .decode(digest)
            .map_err(|err| CryptoError::Hash(format!("invalid digest: {err}")))?;
        Ok(Self::digest(&salt, secret) == expected)
    }
}

/// AES-256-GCM encryption; the random nonce is prepended to the ciphertext.
#[derive(Clone)]
pub struct AesGcmEncryptor {
    key_id: String,
    cipher: Aes256Gcm,
}

impl fmt::Debug for AesGcmEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncryptor")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl AesGcmEncryptor {
    pub fn new_from_base64(key_id: impl Into<String>, key_b64: &str) -> Result<Self, CryptoError> {
        let trimmed = key_b64.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::InvalidKey("encryption key cannot be empty".to_string()));
        }
        let bytes = STANDARD
            .decode(trimmed)
            .map_err(|err| CryptoError::InvalidKey(format!("invalid encryption key: {err}")))?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(
                "encryption key must decode to 32 bytes (256 bits)".to_string(),
            ));
        }
        #[allow(deprecated)]
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            key_id: key_id.into(),
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Fresh random key, for tests and local runs.
    pub fn generate(key_id: impl Into<String>) -> Result<Self, CryptoError> {
        let mut key = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|err| CryptoError::InvalidKey(format!("key generation failed: {err}")))?;
        Self::new_from_base64(key_id, &STANDARD.encode(key))
    }
}

impl SecretEncryptor for AesGcmEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<CryptoValue, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|err| CryptoError::Encrypt(format!("nonce generation failed: {err}")))?;
        #[allow(deprecated)]
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|err| CryptoError::Encrypt(err.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(CryptoValue {
            algorithm: AES_ALGORITHM.to_string(),
            key_id: self.key_id.clone(),
            crypted: STANDARD.encode(combined),
        })
    }

    fn decrypt(&self, value: &CryptoValue) -> Result<Vec<u8>, CryptoError> {
        if value.algorithm != AES_ALGORITHM {
            return Err(CryptoError::Decrypt(format!(
                "unsupported algorithm '{}'",
                value.algorithm
            )));
        }
        if value.key_id != self.key_id {
            return Err(CryptoError::InvalidKey(format!("unknown key id '{}'", value.key_id)));
        }
        let combined = STANDARD
            .decode(&value.crypted)
            .map_err(|err| CryptoError::Decrypt(format!("invalid encrypted payload: {err}")))?;
        if combined.len() <= NONCE_LEN {
            return Err(CryptoError::Decrypt("encrypted payload too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        #[allow(deprecated)]
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|err| CryptoError::Decrypt(err.to_string()))
    }
}
