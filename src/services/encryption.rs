// Net Automount - Secret Encryption
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Encryption for the on-disk secret vault.
//!
//! Uses AES-256-GCM for authenticated encryption. Each message gets its own
//! Argon2id-derived key from the vault passphrase and a random salt stored
//! alongside the ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

/// Length of the random salt used for key derivation.
const SALT_LEN: usize = 16;
/// Length of the AES-256-GCM nonce.
const NONCE_LEN: usize = 12;

/// Wrapper around key bytes that zeroes memory on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
struct KeyMaterial([u8; 32]);

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}

/// Passphrase-based cipher for vault contents.
pub struct SecretCipher {
    passphrase: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key_id", &self.key_id())
            .finish()
    }
}

impl SecretCipher {
    /// Create a cipher from raw passphrase bytes.
    pub fn new(passphrase: &[u8]) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.to_vec()),
        }
    }

    /// Generate a fresh random passphrase, base64-encoded.
    pub fn generate_passphrase() -> Zeroizing<String> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut *bytes);
        Zeroizing::new(BASE64.encode(&*bytes))
    }

    /// Short identifier of the passphrase, safe to log and persist.
    pub fn key_id(&self) -> String {
        let digest = Sha256::digest(self.passphrase.as_slice());
        digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
    }

    /// Derive a 256-bit key from passphrase + salt using Argon2id.
    fn derive_key(&self, salt: &[u8]) -> Result<KeyMaterial, EncryptionError> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(&self.passphrase, salt, &mut key)
            .map_err(|e| EncryptionError::EncryptionFailed(format!("Key derivation failed: {}", e)))?;
        Ok(KeyMaterial(key))
    }

    /// Encrypt data and return base64-encoded ciphertext.
    ///
    /// Output format: `base64(salt ‖ nonce ‖ ciphertext)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, EncryptionError> {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let key = self.derive_key(&salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key.0)
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let mut result = salt.to_vec();
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);

        Ok(BASE64.encode(&result))
    }

    /// Decrypt base64-encoded ciphertext produced by [`SecretCipher::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
        let data = BASE64
            .decode(encoded.trim())
            .map_err(|e| EncryptionError::InvalidData(e.to_string()))?;

        if data.len() < SALT_LEN + NONCE_LEN + 1 {
            return Err(EncryptionError::InvalidData("ciphertext too short".to_string()));
        }

        let (salt, rest) = data.split_at(SALT_LEN);
        let (nonce_bytes, encrypted) = rest.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let key = self.derive_key(salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key.0)
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        cipher
            .decrypt(nonce, encrypted)
            .map(Zeroizing::new)
            .map_err(|_| EncryptionError::DecryptionFailed)
    }

    /// Encrypt a JSON-serializable value.
    pub fn encrypt_json<T: serde::Serialize>(&self, value: &T) -> Result<String, EncryptionError> {
        let json = Zeroizing::new(
            serde_json::to_vec(value).map_err(|e| EncryptionError::SerializationFailed(e.to_string()))?,
        );
        self.encrypt(&json)
    }

    /// Decrypt to a JSON-deserializable value.
    pub fn decrypt_json<T: serde::de::DeserializeOwned>(&self, encoded: &str) -> Result<T, EncryptionError> {
        let json = self.decrypt(encoded)?;
        serde_json::from_slice(&json).map_err(|e| EncryptionError::SerializationFailed(e.to_string()))
    }
}

/// Errors that can occur during encryption/decryption.
#[derive(Debug, Clone)]
pub enum EncryptionError {
    /// Encryption operation failed.
    EncryptionFailed(String),
    /// Decryption failed (wrong key or corrupted data).
    DecryptionFailed,
    /// Invalid input data.
    InvalidData(String),
    /// Serialization/deserialization failed.
    SerializationFailed(String),
}

impl std::fmt::Display for EncryptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EncryptionFailed(msg) => write!(f, "Encryption failed: {}", msg),
            Self::DecryptionFailed => write!(f, "Decryption failed (wrong key or corrupted data)"),
            Self::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Self::SerializationFailed(msg) => write!(f, "Serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for EncryptionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = SecretCipher::new(b"test-password");
        let encrypted = cipher.encrypt(b"Hello, World!").expect("encryption failed");
        let decrypted = cipher.decrypt(&encrypted).expect("decryption failed");
        assert_eq!(decrypted.as_slice(), b"Hello, World!");
    }

    #[test]
    fn test_wrong_key() {
        let encrypted = SecretCipher::new(b"password1").encrypt(b"secret data").unwrap();
        let result = SecretCipher::new(b"password2").decrypt(&encrypted);
        assert!(matches!(result, Err(EncryptionError::DecryptionFailed)));
    }

    #[test]
    fn test_salts_differ_per_message() {
        let cipher = SecretCipher::new(b"k");
        assert_ne!(cipher.encrypt(b"same").unwrap(), cipher.encrypt(b"same").unwrap());
    }

    #[test]
    fn test_json_map() {
        let cipher = SecretCipher::new(b"vault");
        let mut map = BTreeMap::new();
        map.insert("nas".to_string(), "hunter2".to_string());
        let encrypted = cipher.encrypt_json(&map).unwrap();
        assert!(!encrypted.contains("hunter2"));
        let decrypted: BTreeMap<String, String> = cipher.decrypt_json(&encrypted).unwrap();
        assert_eq!(decrypted, map);
    }

    #[test]
    fn test_truncated_input() {
        let cipher = SecretCipher::new(b"k");
        assert!(matches!(cipher.decrypt("AAAA"), Err(EncryptionError::InvalidData(_))));
    }
}
