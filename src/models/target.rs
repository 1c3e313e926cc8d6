// Net Automount - Mount Target Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Mount targets and their auto-mount rules.
//!
//! A MountTarget describes one remote share: where it lives, how to reach
//! it, and on which networks it should be mounted automatically. The
//! password is never stored here; `secret_ref` points into the secret store.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::error::{Error, Result};
use super::fingerprint::NetworkFingerprint;

/// Remote share protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProtocol {
    /// SMB/CIFS share.
    #[default]
    Smb,
    /// NFS export.
    Nfs,
    /// FTP server (mounted through curlftpfs).
    Ftp,
}

impl NetworkProtocol {
    /// URL scheme.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Smb => "smb",
            Self::Nfs => "nfs",
            Self::Ftp => "ftp",
        }
    }

    /// Well-known TCP port used for reachability probing.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Smb => 445,
            Self::Nfs => 2049,
            Self::Ftp => 21,
        }
    }

    /// Parse a protocol name as typed on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "smb" | "cifs" => Some(Self::Smb),
            "nfs" => Some(Self::Nfs),
            "ftp" => Some(Self::Ftp),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Rule binding a target to a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMountRule {
    /// Unique rule identifier.
    pub id: Uuid,
    /// Network the rule applies to.
    pub fingerprint: NetworkFingerprint,
    /// Whether the rule is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl AutoMountRule {
    /// Create a new enabled rule for a network.
    pub fn new(fingerprint: NetworkFingerprint) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            enabled: true,
        }
    }
}

/// A configured remote share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountTarget {
    /// Unique target identifier.
    pub id: Uuid,
    /// User-visible name.
    pub alias: String,
    /// Share protocol.
    #[serde(default)]
    pub protocol: NetworkProtocol,
    /// Server host name or IP address.
    pub hostname: String,
    /// Share path on the server (e.g. "Shared").
    #[serde(default)]
    pub share_path: String,
    /// Optional user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Reference to the password in the secret store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
    /// Port override for reachability probing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Auto-mount rules, in user order.
    #[serde(default)]
    pub rules: Vec<AutoMountRule>,
}

impl MountTarget {
    /// Create a new target without rules or credentials.
    pub fn new(
        alias: impl Into<String>,
        protocol: NetworkProtocol,
        hostname: impl Into<String>,
        share_path: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: alias.into(),
            protocol,
            hostname: hostname.into(),
            share_path: share_path.into(),
            username: None,
            secret_ref: None,
            port: None,
            rules: Vec::new(),
        }
    }

    /// Share path with leading/trailing slashes and backslashes removed.
    pub fn clean_share_path(&self) -> &str {
        self.share_path.trim_matches(|c| c == '/' || c == '\\')
    }

    /// Port to probe before mounting.
    pub fn probe_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }

    /// Build the access URL (never contains the password).
    pub fn access_url(&self) -> Result<ShareUrl> {
        ShareUrl::new(
            self.protocol,
            &self.hostname,
            self.username.as_deref(),
            self.clean_share_path(),
        )
    }

    /// Check whether any enabled rule matches the observed network.
    pub fn matches_network(&self, observed: &NetworkFingerprint) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.enabled && rule.fingerprint.matches(observed))
    }
}

/// Access URL for a share: `scheme://[user@]host[/path]`.
///
/// IP literals are stored as IP hosts, so IPv6 addresses render bracketed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareUrl {
    pub protocol: NetworkProtocol,
    url: Url,
    /// Share path without leading or trailing separators, `/`-separated.
    share_path: String,
}

impl ShareUrl {
    /// Build the URL of a share on `host`.
    pub fn new(
        protocol: NetworkProtocol,
        host: &str,
        username: Option<&str>,
        share_path: &str,
    ) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidUrl(format!("{}://{}: {}", protocol.scheme(), host, reason));

        let mut url = Url::parse(&format!("{}://localhost", protocol.scheme()))
            .map_err(|e| invalid(&e.to_string()))?;
        match host.parse::<IpAddr>() {
            Ok(ip) => url.set_ip_host(ip).map_err(|_| invalid("cannot carry a host"))?,
            Err(_) => url.set_host(Some(host)).map_err(|e| invalid(&e.to_string()))?,
        }
        if let Some(user) = username.filter(|u| !u.is_empty()) {
            url.set_username(user).map_err(|_| invalid("cannot carry a user name"))?;
        }

        let share_path = share_path
            .replace('\\', "/")
            .trim_matches('/')
            .to_string();
        if !share_path.is_empty() {
            url.set_path(&format!("/{}", share_path));
        }

        Ok(Self {
            protocol,
            url,
            share_path,
        })
    }

    /// Host as typed, without IPv6 brackets.
    pub fn host(&self) -> &str {
        self.url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .unwrap_or_default()
    }

    /// Host as it appears in a mount source (IPv6 bracketed).
    pub fn source_host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Last path segment, if any.
    pub fn share_name(&self) -> Option<&str> {
        self.share_path.rsplit('/').find(|segment| !segment.is_empty())
    }

    /// Name of the mount point: the share name, or the host for host-root shares.
    pub fn mount_name(&self) -> &str {
        self.share_name().unwrap_or_else(|| self.host())
    }

    /// Path without its leading slash.
    pub fn relative_path(&self) -> &str {
        &self.share_path
    }

    /// The URL without its user name.
    pub fn location(&self) -> Url {
        let mut location = self.url.clone();
        // A URL with a host always accepts a user name.
        let _ = location.set_username("");
        location
    }
}

impl fmt::Display for ShareUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Credentials resolved from the secret store right before a mount call.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
