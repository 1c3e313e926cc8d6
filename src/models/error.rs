// Net Automount - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for the auto-mount daemon.

use std::path::PathBuf;

use thiserror::Error;

/// `errno` value reported when a share is already mounted or the mount point exists.
pub const EEXIST: i32 = 17;

/// `errno` value reported when a mount call exceeds its time limit.
pub const ETIMEDOUT: i32 = 110;

/// Result type alias for Net Automount operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Net Automount operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Mount Errors
    // ========================================
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Mount rejected with error code {code}")]
    MountRejected { code: i32 },

    #[error("Share already mounted but no matching mount could be found: {0}")]
    MountConflict(String),

    #[error("Unmount failed: {path} - {reason}")]
    UnmountFailed { path: PathBuf, reason: String },

    #[error("Invalid share URL: {0}")]
    InvalidUrl(String),

    #[error("Mount target not found: {0}")]
    TargetNotFound(String),

    // ========================================
    // Reconciliation Errors
    // ========================================
    #[error("Stale mount at {path} could not be recovered (error code {code})")]
    ZombieRecoveryFailed { path: PathBuf, code: i32 },

    #[error("Giving up on {alias} after {attempts} attempts")]
    RetriesExhausted { alias: String, attempts: u32 },

    // ========================================
    // Secret Store Errors
    // ========================================
    #[error("Failed to store secret: {0}")]
    SecretWriteFailed(String),

    #[error("Failed to read secret store: {0}")]
    SecretReadFailed(String),

    // ========================================
    // Storage Errors
    // ========================================
    #[error("Failed to read configuration: {0}")]
    ConfigReadFailed(String),

    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    // ========================================
    // Validation Errors
    // ========================================
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Invalid share path: {0}")]
    InvalidSharePath(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    // ========================================
    // D-Bus Errors
    // ========================================
    #[error("D-Bus error: {0}")]
    Dbus(String),

    #[error("D-Bus connection failed: {0}")]
    DbusConnectionFailed(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System error: {0}")]
    System(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new unmount failed error.
    pub fn unmount_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnmountFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if the mount primitive reported "already mounted / mount point exists".
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::MountRejected { code } if *code == EEXIST)
    }

    /// Check if this failure may succeed on a later attempt of the same cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_)
                | Self::MountRejected { .. }
                | Self::MountConflict(_)
                | Self::ZombieRecoveryFailed { .. }
                | Self::UnmountFailed { .. }
                | Self::Io(_)
                | Self::System(_)
        )
    }

    /// Check if this error means the system bus is not available.
    pub fn is_bus_unavailable(&self) -> bool {
        matches!(self, Self::DbusConnectionFailed(_))
    }
}

// Convert from zbus errors
impl From<zbus::Error> for Error {
    fn from(err: zbus::Error) -> Self {
        Error::Dbus(err.to_string())
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from toml serialize errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigWriteFailed(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_detection() {
        assert!(Error::MountRejected { code: EEXIST }.is_conflict());
        assert!(!Error::MountRejected { code: 13 }.is_conflict());
        assert!(!Error::MountConflict("Shared".into()).is_conflict());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::Unreachable("nas.local:445 timed out".into()).is_retryable());
        assert!(Error::ZombieRecoveryFailed {
            path: PathBuf::from("/mnt/Shared"),
            code: 32
        }
        .is_retryable());
        assert!(!Error::InvalidUrl("smb://".into()).is_retryable());
        assert!(!Error::RetriesExhausted {
            alias: "NAS".into(),
            attempts: 5
        }
        .is_retryable());
    }
}
