// Net Automount - Secret Store
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Credential storage.
//!
//! Targets only carry a reference to their password; the password itself
//! lives in a [`SecretStore`]. The bundled backend is an encrypted vault
//! file in the config directory:
//!
//! - `vault.key`: random per-install passphrase (0600)
//! - `secrets.json.enc`: `base64(salt ‖ nonce ‖ AES-GCM(json map))` (0600)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::encryption::SecretCipher;
use crate::models::{Error, Result, SECRET_SERVICE_NAME};

/// Opaque key→secret store.
pub trait SecretStore: Send + Sync {
    /// Store `secret` under `reference`, replacing any previous value.
    /// Returns the reference the secret is stored under.
    fn save(&self, secret: &str, reference: &str) -> Result<String>;

    /// Retrieve the secret stored under `reference`.
    fn retrieve(&self, reference: &str) -> Option<String>;

    /// Delete the secret stored under `reference` (no-op if missing).
    fn delete(&self, reference: &str);
}

type SecretMap = BTreeMap<String, String>;

/// Encrypted file-backed secret store.
#[derive(Debug)]
pub struct VaultSecretStore {
    vault_file: PathBuf,
    cipher: SecretCipher,
    /// Serializes read-modify-write cycles on the vault file.
    write_guard: Mutex<()>,
}

impl VaultSecretStore {
    /// Open (or initialise) the vault in `config_dir`.
    pub fn open(config_dir: &Path) -> Result<Self> {
        fs::create_dir_all(config_dir)?;
        let key_file = config_dir.join("vault.key");

        let passphrase = if key_file.exists() {
            Zeroizing::new(
                fs::read_to_string(&key_file)
                    .map_err(|e| Error::SecretReadFailed(format!("{}: {}", key_file.display(), e)))?,
            )
        } else {
            let generated = SecretCipher::generate_passphrase();
            write_private(&key_file, generated.as_bytes())
                .map_err(|e| Error::SecretWriteFailed(format!("{}: {}", key_file.display(), e)))?;
            info!("Created new secret vault key in {:?}", key_file);
            generated
        };

        let cipher = SecretCipher::new(passphrase.trim().as_bytes());
        debug!("Opened {} (key {})", SECRET_SERVICE_NAME, cipher.key_id());

        Ok(Self {
            vault_file: config_dir.join("secrets.json.enc"),
            cipher,
            write_guard: Mutex::new(()),
        })
    }

    fn read_map(&self) -> Result<SecretMap> {
        if !self.vault_file.exists() {
            return Ok(SecretMap::new());
        }
        let encrypted = fs::read_to_string(&self.vault_file)
            .map_err(|e| Error::SecretReadFailed(e.to_string()))?;
        self.cipher
            .decrypt_json(&encrypted)
            .map_err(|e| Error::SecretReadFailed(e.to_string()))
    }

    fn write_map(&self, map: &SecretMap) -> Result<()> {
        let encrypted = self
            .cipher
            .encrypt_json(map)
            .map_err(|e| Error::SecretWriteFailed(e.to_string()))?;
        write_private(&self.vault_file, encrypted.as_bytes())
            .map_err(|e| Error::SecretWriteFailed(e.to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.write_guard.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Vault lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl SecretStore for VaultSecretStore {
    fn save(&self, secret: &str, reference: &str) -> Result<String> {
        let _guard = self.lock();
        let mut map = self.read_map()?;
        map.insert(reference.to_string(), secret.to_string());
        self.write_map(&map)?;
        debug!("Stored secret for reference {}", reference);
        Ok(reference.to_string())
    }

    fn retrieve(&self, reference: &str) -> Option<String> {
        match self.read_map() {
            Ok(map) => map.get(reference).cloned(),
            Err(e) => {
                warn!("Failed to read secret vault: {}", e);
                None
            }
        }
    }

    fn delete(&self, reference: &str) {
        let _guard = self.lock();
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                warn!("Failed to read secret vault: {}", e);
                return;
            }
        };
        if map.remove(reference).is_some() {
            if let Err(e) = self.write_map(&map) {
                warn!("Failed to delete secret {}: {}", reference, e);
            }
        }
    }
}

/// Write a file readable only by the owner.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_retrieve_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = VaultSecretStore::open(dir.path()).unwrap();

        assert_eq!(store.save("hunter2", "nas-jane").unwrap(), "nas-jane");
        assert_eq!(store.retrieve("nas-jane").as_deref(), Some("hunter2"));
        assert_eq!(store.retrieve("missing"), None);

        store.delete("nas-jane");
        assert_eq!(store.retrieve("nas-jane"), None);
        store.delete("nas-jane");
    }

    #[test]
    fn test_vault_is_encrypted_and_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VaultSecretStore::open(dir.path()).unwrap();
            store.save("correct horse", "backup").unwrap();
        }
        let raw = fs::read_to_string(dir.path().join("secrets.json.enc")).unwrap();
        assert!(!raw.contains("correct horse"));

        let reopened = VaultSecretStore::open(dir.path()).unwrap();
        assert_eq!(reopened.retrieve("backup").as_deref(), Some("correct horse"));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = VaultSecretStore::open(dir.path()).unwrap();
        store.save("old", "ref").unwrap();
        store.save("new", "ref").unwrap();
        assert_eq!(store.retrieve("ref").as_deref(), Some("new"));
    }
}
