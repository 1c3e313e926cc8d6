// Net Automount - Mount Status Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Observed mount state and per-target attempt status.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness of an OS-level mount correlated to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountLiveness {
    /// Mounted and responsive.
    Live,
    /// Present in the mount table but unresponsive.
    Zombie,
    /// No correlated mount.
    Absent,
}

impl MountLiveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Zombie => "zombie",
            Self::Absent => "absent",
        }
    }
}

/// Mount table entry correlated to a target. Recomputed on demand, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRecord {
    /// Mount point of the correlated entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<PathBuf>,
    /// Observed liveness.
    pub liveness: MountLiveness,
}

impl MountRecord {
    pub fn absent() -> Self {
        Self {
            mount_path: None,
            liveness: MountLiveness::Absent,
        }
    }

    pub fn new(mount_path: PathBuf, liveness: MountLiveness) -> Self {
        Self {
            mount_path: Some(mount_path),
            liveness,
        }
    }
}

/// Phase of a target's attempt cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    /// No cycle running.
    #[default]
    Idle,
    /// Checking server reachability.
    Probing,
    /// Mount call in progress.
    Mounting,
    /// Share mounted.
    Mounted,
    /// Waiting for the next attempt.
    RetryScheduled,
    /// Attempts exhausted until the next network change.
    GivenUp,
}

impl AttemptPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Mounting => "mounting",
            Self::Mounted => "mounted",
            Self::RetryScheduled => "retry scheduled",
            Self::GivenUp => "given up",
        }
    }
}

/// User-visible status of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStatus {
    /// Current phase.
    pub phase: AttemptPhase,
    /// 1-based attempt number within the current cycle (0 when idle).
    pub attempt: u32,
    /// Mount point once mounted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<PathBuf>,
    /// Last failure of the current cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Time of the last transition.
    pub updated_at: DateTime<Utc>,
}

impl Default for TargetStatus {
    fn default() -> Self {
        Self {
            phase: AttemptPhase::Idle,
            attempt: 0,
            mount_path: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}
