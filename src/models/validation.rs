// Net Automount - Validation Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Input validation for mount targets and rules.

use std::net::IpAddr;
use std::str::FromStr;

use super::error::{Error, Result};
use super::target::MountTarget;

/// Validate a target alias.
pub fn validate_alias(s: &str) -> Result<String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::ValidationFailed(
            "Alias cannot be empty".to_string(),
        ));
    }
    if s.len() > 100 {
        return Err(Error::ValidationFailed(
            "Alias must be 100 characters or less".to_string(),
        ));
    }
    Ok(s.to_string())
}

/// Validate a MAC address string.
///
/// Accepts `aa:bb:cc:dd:ee:ff` and `AA-BB-CC-DD-EE-FF`; returns the
/// lower-case, colon-separated form used in fingerprints.
pub fn validate_mac_address(s: &str) -> Result<String> {
    let normalized = s.replace('-', ":").to_lowercase();
    let parts: Vec<&str> = normalized.split(':').collect();

    if parts.len() != 6 {
        return Err(Error::InvalidMacAddress(s.to_string()));
    }

    for part in &parts {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidMacAddress(s.to_string()));
        }
    }

    Ok(normalized)
}

/// Validate a hostname or IP literal.
pub fn validate_hostname(s: &str) -> Result<String> {
    if IpAddr::from_str(s).is_ok() {
        return Ok(s.to_string());
    }

    if s.is_empty() || s.len() > 253 {
        return Err(Error::InvalidHostname(format!(
            "Hostname must be 1-253 characters: {}",
            s
        )));
    }

    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(Error::InvalidHostname(format!(
                "Label must be 1-63 characters: {}",
                label
            )));
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(Error::InvalidHostname(format!(
                "Invalid characters in label: {}",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::InvalidHostname(format!(
                "Label cannot start or end with hyphen: {}",
                label
            )));
        }
    }

    Ok(s.to_lowercase())
}

/// Validate a share path. Leading and trailing separators are allowed.
pub fn validate_share_path(s: &str) -> Result<()> {
    if s.contains('\0') {
        return Err(Error::InvalidSharePath(
            "Share path contains a NUL byte".to_string(),
        ));
    }
    if s.split(|c| c == '/' || c == '\\').any(|segment| segment == "..") {
        return Err(Error::InvalidSharePath(format!(
            "Share path cannot contain '..': {}",
            s
        )));
    }
    Ok(())
}

/// Validate a user name passed to the mount helpers.
///
/// `,` and `=` would split the cifs option string.
pub fn validate_username(s: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::ValidationFailed("User name cannot be empty".to_string()));
    }
    if let Some(c) = s.chars().find(|c| matches!(c, ',' | '=') || c.is_control()) {
        return Err(Error::ValidationFailed(format!(
            "User name cannot contain {:?}",
            c
        )));
    }
    Ok(())
}

/// Validate a full target before it is saved.
pub fn validate_target(target: &MountTarget) -> Result<()> {
    validate_alias(&target.alias)?;
    validate_hostname(&target.hostname)?;
    validate_share_path(&target.share_path)?;
    if let Some(username) = &target.username {
        validate_username(username)?;
    }
    if target.port == Some(0) {
        return Err(Error::ValidationFailed("Port cannot be 0".to_string()));
    }
    for rule in &target.rules {
        if let Some(mac) = &rule.fingerprint.gateway_mac {
            validate_mac_address(mac)?;
        }
    }
    Ok(())
}
