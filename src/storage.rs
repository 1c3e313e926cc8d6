// Net Automount - Local Storage
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Local data storage for the daemon and the command-line front end.
//!
//! Handles:
//! - Application settings (`settings.toml`)
//! - The configured mount targets (`targets.json`)
//!
//! This module uses RwLock for thread-safe access. Lock poisoning is handled
//! gracefully by recovering the inner value, as poison indicates a panic
//! in another thread but the data itself may still be valid.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::validation::validate_target;
use crate::models::{AppConfig, Error, MountTarget, Result, SchemaVersion, CONFIG_DIR_NAME};

/// Ordered list-of-records store for mount targets.
pub trait TargetStore: Send + Sync {
    /// Load all targets in user order.
    fn load_targets(&self) -> Result<Vec<MountTarget>>;

    /// Replace the stored targets.
    fn save_targets(&self, targets: &[MountTarget]) -> Result<()>;
}

/// On-disk layout of `targets.json`.
#[derive(Debug, Serialize, Deserialize)]
struct TargetsFile {
    #[serde(default)]
    schema_version: SchemaVersion,
    #[serde(default)]
    targets: Vec<MountTarget>,
}

/// Local data store.
#[derive(Debug)]
pub struct DataStore {
    /// Configuration directory path.
    config_dir: PathBuf,
    /// Settings file path.
    settings_file: PathBuf,
    /// Target list file path.
    targets_file: PathBuf,

    /// Application settings.
    settings: RwLock<AppConfig>,
}

impl DataStore {
    /// Create a new data store with the default config directory.
    pub fn new() -> Self {
        Self::with_config_dir(Self::default_config_dir())
    }

    /// Default configuration directory (`$XDG_CONFIG_HOME/net-automount`).
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    /// Create a new data store with a specific config directory.
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&config_dir) {
            error!("Failed to create config directory: {}", e);
        }
        // Set restrictive permissions on the config directory (0700)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&config_dir, fs::Permissions::from_mode(0o700));
        }

        let store = Self {
            settings_file: config_dir.join("settings.toml"),
            targets_file: config_dir.join("targets.json"),
            config_dir,
            settings: RwLock::new(AppConfig::default()),
        };

        store.load_settings();
        store
    }

    // ========================================================================
    // RwLock Helper Methods (handle poisoning gracefully)
    // ========================================================================

    /// Read from RwLock, recovering from poison if needed.
    fn read_lock<T, F, R>(&self, lock: &RwLock<T>, context: &str, reader: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        match lock.read() {
            Ok(guard) => reader(&*guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading {}, recovering", context);
                reader(&*poisoned.into_inner())
            }
        }
    }

    /// Write to RwLock, recovering from poison if needed.
    fn write_lock<T, F>(&self, lock: &RwLock<T>, context: &str, writer: F)
    where
        F: FnOnce(&mut T),
    {
        match lock.write() {
            Ok(mut guard) => writer(&mut *guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing {}, recovering", context);
                writer(&mut *poisoned.into_inner())
            }
        }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Load settings from disk.
    fn load_settings(&self) {
        if self.settings_file.exists() {
            match AppConfig::load_from_file(&self.settings_file) {
                Ok(config) => {
                    self.write_lock(&self.settings, "settings", |s| {
                        *s = config;
                    });
                    info!("Loaded settings from {:?}", self.settings_file);
                }
                Err(e) => {
                    error!("Failed to load settings: {}", e);
                }
            }
        } else if let Err(e) = self.update_settings(AppConfig::default()) {
            warn!("Failed to write default settings: {}", e);
        } else {
            info!("Wrote default settings to {:?}", self.settings_file);
        }
    }

    /// Get the current settings.
    pub fn settings(&self) -> AppConfig {
        self.read_lock(&self.settings, "settings", |s| s.clone())
    }

    /// Update settings and persist them.
    pub fn update_settings(&self, settings: AppConfig) -> Result<()> {
        settings.save_to_file(&self.settings_file)?;
        self.write_lock(&self.settings, "settings", |s| {
            *s = settings;
        });
        Ok(())
    }

    // ========================================================================
    // Targets
    // ========================================================================

    /// Find a target by alias (case-insensitive).
    pub fn find_target(&self, alias: &str) -> Result<MountTarget> {
        self.load_targets()?
            .into_iter()
            .find(|t| t.alias.eq_ignore_ascii_case(alias))
            .ok_or_else(|| Error::TargetNotFound(alias.to_string()))
    }

    /// Add a new target. Aliases must be unique.
    pub fn add_target(&self, target: MountTarget) -> Result<()> {
        validate_target(&target)?;
        let mut targets = self.load_targets()?;
        if targets.iter().any(|t| t.alias.eq_ignore_ascii_case(&target.alias)) {
            return Err(Error::ValidationFailed(format!(
                "A target named '{}' already exists",
                target.alias
            )));
        }
        info!("Adding target '{}' ({} on {})", target.alias, target.protocol, target.hostname);
        targets.push(target);
        self.save_targets(&targets)
    }

    /// Replace an existing target (matched by ID).
    pub fn update_target(&self, target: MountTarget) -> Result<()> {
        validate_target(&target)?;
        let mut targets = self.load_targets()?;
        let slot = targets
            .iter_mut()
            .find(|t| t.id == target.id)
            .ok_or_else(|| Error::TargetNotFound(target.alias.clone()))?;
        *slot = target;
        self.save_targets(&targets)
    }

    /// Remove a target (and with it, its rules). Returns the removed target.
    pub fn remove_target(&self, id: Uuid) -> Result<MountTarget> {
        let mut targets = self.load_targets()?;
        let index = targets
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::TargetNotFound(id.to_string()))?;
        let removed = targets.remove(index);
        self.save_targets(&targets)?;
        info!("Removed target '{}'", removed.alias);
        Ok(removed)
    }

    /// Get the config directory path.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

impl TargetStore for DataStore {
    fn load_targets(&self) -> Result<Vec<MountTarget>> {
        if !self.targets_file.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.targets_file)
            .map_err(|e| Error::ConfigReadFailed(format!("{}: {}", self.targets_file.display(), e)))?;
        let parsed: TargetsFile = serde_json::from_reader(BufReader::new(file))?;

        if !parsed.schema_version.is_compatible() {
            return Err(Error::ConfigParseFailed(format!(
                "Unsupported targets schema version {}",
                parsed.schema_version
            )));
        }

        Ok(parsed.targets)
    }

    fn save_targets(&self, targets: &[MountTarget]) -> Result<()> {
        let file = File::create(&self.targets_file)
            .map_err(|e| Error::ConfigWriteFailed(format!("{}: {}", self.targets_file.display(), e)))?;
        // Set restrictive permissions on the target list
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.targets_file, fs::Permissions::from_mode(0o600));
        }

        let contents = TargetsFile {
            schema_version: SchemaVersion::default(),
            targets: targets.to_vec(),
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &contents)
            .map_err(|e| Error::ConfigWriteFailed(e.to_string()))?;
        info!("Saved {} target(s)", targets.len());
        Ok(())
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AutoMountRule, NetworkFingerprint, NetworkProtocol};

    fn store() -> (tempfile::TempDir, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::with_config_dir(dir.path().join("config"));
        (dir, store)
    }

    #[test]
    fn test_empty_store_has_no_targets() {
        let (_dir, store) = store();
        assert!(store.load_targets().unwrap().is_empty());
    }

    #[test]
    fn test_targets_round_trip_in_order() {
        let (_dir, store) = store();
        let mut first = MountTarget::new("Media", NetworkProtocol::Smb, "nas.local", "Media");
        first.rules.push(AutoMountRule::new(NetworkFingerprint::wifi("Home")));
        let second = MountTarget::new("Backups", NetworkProtocol::Nfs, "10.0.0.2", "/export/backups");

        store.add_target(first.clone()).unwrap();
        store.add_target(second.clone()).unwrap();

        let loaded = store.load_targets().unwrap();
        assert_eq!(loaded, vec![first, second]);
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let (_dir, store) = store();
        store
            .add_target(MountTarget::new("NAS", NetworkProtocol::Smb, "nas.local", "A"))
            .unwrap();
        let result = store.add_target(MountTarget::new("nas", NetworkProtocol::Smb, "other", "B"));
        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn test_remove_target_drops_rules() {
        let (_dir, store) = store();
        let mut target = MountTarget::new("NAS", NetworkProtocol::Smb, "nas.local", "Shared");
        target.rules.push(AutoMountRule::new(NetworkFingerprint::wifi("Home")));
        let id = target.id;
        store.add_target(target).unwrap();

        let removed = store.remove_target(id).unwrap();
        assert_eq!(removed.rules.len(), 1);
        assert!(store.load_targets().unwrap().is_empty());
        assert!(matches!(store.remove_target(id), Err(Error::TargetNotFound(_))));
    }

    #[test]
    fn test_find_and_update_target() {
        let (_dir, store) = store();
        store
            .add_target(MountTarget::new("NAS", NetworkProtocol::Smb, "nas.local", "Shared"))
            .unwrap();

        let mut target = store.find_target("nas").unwrap();
        target.username = Some("jane".into());
        store.update_target(target).unwrap();

        assert_eq!(store.find_target("NAS").unwrap().username.as_deref(), Some("jane"));
        assert!(matches!(store.find_target("missing"), Err(Error::TargetNotFound(_))));
    }

    #[test]
    fn test_incompatible_schema_rejected() {
        let (_dir, store) = store();
        fs::write(
            store.config_dir().join("targets.json"),
            r#"{"schema_version":"2.0.0","targets":[]}"#,
        )
        .unwrap();
        assert!(matches!(store.load_targets(), Err(Error::ConfigParseFailed(_))));
    }

    #[test]
    fn test_first_open_writes_default_settings() {
        let (dir, store) = store();
        let written = AppConfig::load_from_file(&dir.path().join("config").join("settings.toml")).unwrap();
        assert_eq!(written.max_attempts, store.settings().max_attempts);
        assert_eq!(written.mount_timeout(), store.settings().mount_timeout());
    }

    #[test]
    fn test_settings_persist() {
        let (dir, store) = store();
        let mut settings = store.settings();
        settings.retry_delay_secs = 9;
        store.update_settings(settings).unwrap();

        let reopened = DataStore::with_config_dir(dir.path().join("config"));
        assert_eq!(reopened.settings().retry_delay_secs, 9);
    }
}
