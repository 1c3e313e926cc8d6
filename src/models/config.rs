// Net Automount - Application Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Application configuration model.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration (`settings.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable auto-mount globally.
    #[serde(default = "default_true")]
    pub auto_mount_enabled: bool,

    /// Quiescence window applied to raw network path updates.
    #[serde(default = "default_network_settle_ms")]
    pub network_settle_ms: u64,

    /// Settle window applied to fingerprint changes before an evaluation pass.
    #[serde(default = "default_evaluation_debounce_ms")]
    pub evaluation_debounce_ms: u64,

    /// Reachability probe timeout.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Fixed delay between mount attempts.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Attempts per cycle before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Ceiling on the mount liveness check.
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,

    /// Ceiling on `mount` and `curlftpfs` invocations.
    #[serde(default = "default_mount_timeout_secs")]
    pub mount_timeout_secs: u64,

    /// Ceiling on `umount` invocations.
    #[serde(default = "default_unmount_timeout_secs")]
    pub unmount_timeout_secs: u64,

    /// Directory receiving mount points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_root: Option<PathBuf>,

    /// Sampling period of the fallback introspector.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_network_settle_ms() -> u64 {
    500
}

fn default_evaluation_debounce_ms() -> u64 {
    2000
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_liveness_timeout_ms() -> u64 {
    2000
}

fn default_mount_timeout_secs() -> u64 {
    30
}

fn default_unmount_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auto_mount_enabled: true,
            network_settle_ms: default_network_settle_ms(),
            evaluation_debounce_ms: default_evaluation_debounce_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            retry_delay_secs: default_retry_delay_secs(),
            max_attempts: default_max_attempts(),
            liveness_timeout_ms: default_liveness_timeout_ms(),
            mount_timeout_secs: default_mount_timeout_secs(),
            unmount_timeout_secs: default_unmount_timeout_secs(),
            mount_root: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, super::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file with restrictive permissions (0600).
    pub fn save_to_file(&self, path: &Path) -> Result<(), super::Error> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }

    pub fn network_settle(&self) -> Duration {
        Duration::from_millis(self.network_settle_ms)
    }

    pub fn evaluation_debounce(&self) -> Duration {
        Duration::from_millis(self.evaluation_debounce_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn mount_timeout(&self) -> Duration {
        Duration::from_secs(self.mount_timeout_secs.max(1))
    }

    pub fn unmount_timeout(&self) -> Duration {
        Duration::from_secs(self.unmount_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Directory receiving mount points (`~/Shares` unless configured).
    pub fn mount_root(&self) -> PathBuf {
        self.mount_root.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("Shares")
        })
    }
}
