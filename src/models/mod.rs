// Net Automount - Data Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Net Automount Models
//!
//! Shared types used by the services and the command-line front end:
//!
//! - **Fingerprint**: normalized network snapshot and the rule matcher
//! - **Target**: configured remote shares and their auto-mount rules
//! - **Status**: observed mount state and per-target attempt status
//! - **Config**: application settings
//! - **Error**: shared error type
//!
//! All persisted types serialize with serde (TOML for settings, JSON for
//! the target list).

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod schema;
pub mod status;
pub mod target;
pub mod validation;

pub use config::AppConfig;
pub use error::{Error, Result, EEXIST, ETIMEDOUT};
pub use fingerprint::{InterfaceType, NetworkFingerprint};
pub use schema::SchemaVersion;
pub use status::{AttemptPhase, MountLiveness, MountRecord, TargetStatus};
pub use target::{AutoMountRule, Credentials, MountTarget, NetworkProtocol, ShareUrl};

/// Configuration directory name (under XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "net-automount";

/// Service name used for the secret vault.
pub const SECRET_SERVICE_NAME: &str = "net-automount.credentials";
