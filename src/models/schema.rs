// Net Automount - Schema Versioning
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Version tag of the persisted target list.

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Schema written by this build.
const TARGETS_SCHEMA: Version = Version::new(1, 0, 0);

/// Version tag stored at the top of `targets.json`.
///
/// Kept as the raw string so an unparseable tag is reported as an
/// unsupported schema rather than a syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Readable by this build: same major version, minor not newer.
    pub fn is_compatible(&self) -> bool {
        Version::parse(&self.0)
            .map(|v| v.major == TARGETS_SCHEMA.major && v.minor <= TARGETS_SCHEMA.minor)
            .unwrap_or(false)
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self(TARGETS_SCHEMA.to_string())
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
