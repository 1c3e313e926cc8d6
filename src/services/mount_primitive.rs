// Net Automount - Mount Primitive
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Thin adapter over the system mount facilities.
//!
//! [`MountPrimitive`] is the only place that touches the OS mount table.
//! [`SystemMounter`] implements it on Linux by shelling out to `mount`,
//! `curlftpfs` and `umount`, and by reading `/proc/self/mounts`.
//!
//! FTP passwords never reach the command line. They are written to a
//! private `.netrc` in a per-mount home directory that `curlftpfs` reads
//! through libcurl, and the directory is removed again on unmount.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::models::validation::validate_username;
use crate::models::{
    Credentials, Error, NetworkProtocol, Result, ShareUrl, CONFIG_DIR_NAME, EEXIST, ETIMEDOUT,
};

/// Filesystem types that can belong to a remote share.
pub const NETWORK_FS_TYPES: &[&str] = &["cifs", "smb3", "nfs", "nfs4", "fuse.curlftpfs"];

/// Default location of the kernel mount table.
const PROC_MOUNTS: &str = "/proc/self/mounts";

/// One network filesystem entry from the OS mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mount point.
    pub path: PathBuf,
    /// Source as reported by the kernel (e.g. `//nas.local/Shared`).
    pub source_hint: String,
    /// Filesystem type (e.g. `cifs`).
    pub fs_type: String,
}

impl MountEntry {
    /// Last segment of the mount point.
    pub fn last_segment(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

/// External mount/unmount/enumerate facility.
#[async_trait]
pub trait MountPrimitive: Send + Sync {
    /// Mount `url`, returning the mount point.
    ///
    /// Fails with `MountRejected { code: EEXIST }` when the share is already
    /// mounted or its mount point is taken.
    async fn mount(&self, url: &ShareUrl, credentials: Option<&Credentials>) -> Result<PathBuf>;

    /// Unmount the filesystem at `path`.
    async fn unmount(&self, path: &Path, force: bool) -> Result<()>;

    /// Enumerate the network filesystems currently mounted.
    async fn list_mounts(&self) -> Result<Vec<MountEntry>>;
}

// ============================================================================
// Linux implementation
// ============================================================================

/// Mount primitive backed by the Linux `mount` tools.
#[derive(Debug, Clone)]
pub struct SystemMounter {
    mount_root: PathBuf,
    mount_timeout: Duration,
    unmount_timeout: Duration,
    mounts_file: PathBuf,
    credentials_dir: PathBuf,
}

impl SystemMounter {
    /// Create a mounter that places mount points under `mount_root`.
    pub fn new(mount_root: PathBuf, mount_timeout: Duration, unmount_timeout: Duration) -> Self {
        Self {
            mount_root,
            mount_timeout,
            unmount_timeout,
            mounts_file: PathBuf::from(PROC_MOUNTS),
            credentials_dir: Self::default_credentials_dir(),
        }
    }

    /// Private directory holding per-mount FTP credentials.
    ///
    /// Prefers `$XDG_RUNTIME_DIR`, which is tmpfs and owned by the user.
    fn default_credentials_dir() -> PathBuf {
        dirs::runtime_dir()
            .or_else(dirs::config_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join(CONFIG_DIR_NAME)
            .join("ftp")
    }

    #[cfg(test)]
    fn with_mounts_file(mut self, mounts_file: PathBuf) -> Self {
        self.mounts_file = mounts_file;
        self
    }

    #[cfg(test)]
    fn with_credentials_dir(mut self, credentials_dir: PathBuf) -> Self {
        self.credentials_dir = credentials_dir;
        self
    }

    /// Mount point used for a share URL.
    pub fn mount_point_for(&self, url: &ShareUrl) -> PathBuf {
        self.mount_root.join(url.mount_name())
    }

    fn mount_command(&self, url: &ShareUrl, mount_point: &Path, credentials: Option<&Credentials>) -> Result<Command> {
        let mut cmd = match url.protocol {
            NetworkProtocol::Smb => {
                let mut cmd = Command::new("mount");
                cmd.args(["-t", "cifs"]).arg(mount_source(url)).arg(mount_point);
                match credentials {
                    Some(credentials) => {
                        validate_username(&credentials.username)?;
                        cmd.arg("-o").arg(format!("username={}", credentials.username));
                        if let Some(password) = credentials.password.as_deref() {
                            cmd.env("PASSWD", password);
                        }
                    }
                    None => {
                        cmd.args(["-o", "guest"]);
                    }
                }
                cmd
            }
            NetworkProtocol::Nfs => {
                let mut cmd = Command::new("mount");
                cmd.args(["-t", "nfs"]).arg(mount_source(url)).arg(mount_point);
                cmd
            }
            NetworkProtocol::Ftp => {
                let mut cmd = Command::new("curlftpfs");
                cmd.arg(mount_source(url)).arg(mount_point);
                if let Some(credentials) = credentials {
                    let home = self.write_netrc(url, credentials)?;
                    cmd.env("HOME", home);
                }
                cmd
            }
        };
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    fn credentials_home(&self, mount_name: &str) -> PathBuf {
        self.credentials_dir.join(mount_name)
    }

    /// Write a `.netrc` for `url` and return the directory holding it.
    fn write_netrc(&self, url: &ShareUrl, credentials: &Credentials) -> Result<PathBuf> {
        let home = self.credentials_home(url.mount_name());
        create_private_dir(&self.credentials_dir)?;
        create_private_dir(&home)?;

        let mut entry = Zeroizing::new(format!(
            "machine {} login {}",
            url.host(),
            netrc_token(&credentials.username)
        ));
        if let Some(password) = credentials.password.as_deref() {
            entry.push_str(" password ");
            entry.push_str(&netrc_token(password));
        }
        entry.push('\n');

        let path = home.join(".netrc");
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(entry.as_bytes())?;
        debug!("Wrote FTP credentials for {} to {:?}", url.host(), path);
        Ok(home)
    }

    /// Remove the credentials written for the mount at `mount_point`.
    fn clear_credentials(&self, mount_point: &Path) {
        let Some(name) = mount_point.file_name() else {
            return;
        };
        let home = self.credentials_dir.join(name);
        if home.exists() {
            if let Err(e) = fs::remove_dir_all(&home) {
                warn!("Failed to remove {:?}: {}", home, e);
            }
        }
    }
}

#[async_trait]
impl MountPrimitive for SystemMounter {
    async fn mount(&self, url: &ShareUrl, credentials: Option<&Credentials>) -> Result<PathBuf> {
        let mount_point = self.mount_point_for(url);

        if self
            .list_mounts()
            .await?
            .iter()
            .any(|entry| entry.path == mount_point)
        {
            debug!("{:?} is already a mount point", mount_point);
            return Err(Error::MountRejected { code: EEXIST });
        }

        tokio::fs::create_dir_all(&mount_point).await?;

        info!("Mounting {} at {:?}", url, mount_point);
        let cmd = self.mount_command(url, &mount_point, credentials)?;
        if let Err(e) = run_mount_command(cmd, self.mount_timeout).await {
            warn!("Mount of {} failed: {}", url, e);
            self.clear_credentials(&mount_point);
            return Err(e);
        }
        Ok(mount_point)
    }

    async fn unmount(&self, path: &Path, force: bool) -> Result<()> {
        let mut cmd = Command::new("umount");
        if force {
            cmd.args(["-f", "-l"]);
        }
        cmd.arg(path).kill_on_drop(true);

        info!("Unmounting {:?}{}", path, if force { " (forced)" } else { "" });
        let output = match timeout(self.unmount_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(Error::unmount_failed(path, e.to_string())),
            Err(_) => return Err(Error::unmount_failed(path, "timed out")),
        };

        if output.status.success() {
            self.clear_credentials(path);
            Ok(())
        } else {
            Err(Error::unmount_failed(
                path,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    async fn list_mounts(&self) -> Result<Vec<MountEntry>> {
        let contents = tokio::fs::read_to_string(&self.mounts_file)
            .await
            .map_err(|e| Error::System(format!("Failed to read {}: {}", self.mounts_file.display(), e)))?;
        Ok(parse_mounts(&contents))
    }
}

/// Run a mount command, killing it once `limit` elapses.
async fn run_mount_command(mut cmd: Command, limit: Duration) -> Result<()> {
    let output = match timeout(limit, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(Error::System(format!("Failed to run mount: {}", e))),
        Err(_) => {
            debug!("Mount command exceeded {:?}", limit);
            return Err(Error::MountRejected { code: ETIMEDOUT });
        }
    };

    if output.status.success() {
        return Ok(());
    }

    let code = rejection_code(&output);
    debug!("Mount stderr ({}): {}", code, String::from_utf8_lossy(&output.stderr).trim());
    Err(Error::MountRejected { code })
}

/// Source argument for the mount tool of `url`'s protocol.
fn mount_source(url: &ShareUrl) -> String {
    match url.protocol {
        NetworkProtocol::Smb => format!("//{}/{}", url.source_host(), url.relative_path()),
        NetworkProtocol::Nfs => format!("{}:/{}", url.source_host(), url.relative_path()),
        NetworkProtocol::Ftp => url.location().to_string(),
    }
}

/// Quote a `.netrc` token when it contains whitespace or quotes.
fn netrc_token(value: &str) -> String {
    if !value.is_empty() && !value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Map a failed mount invocation to an error code.
fn rejection_code(output: &Output) -> i32 {
    let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
    if stderr.contains("already mounted") || stderr.contains("busy") {
        EEXIST
    } else {
        output.status.code().unwrap_or(-1)
    }
}

// ============================================================================
// Mount table parsing
// ============================================================================

/// Parse `/proc/mounts` content, keeping network filesystems only.
///
/// Format: `{source} {mountpoint} {fstype} {options} {dump} {pass}`
pub fn parse_mounts(contents: &str) -> Vec<MountEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            if !NETWORK_FS_TYPES.contains(&fs_type) {
                return None;
            }
            Some(MountEntry {
                path: PathBuf::from(decode_octal(mount_point)),
                source_hint: decode_octal(source),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decode the `\ooo` octal escapes the kernel uses for whitespace and backslashes.
pub fn decode_octal(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_escape(&bytes[i + 1..i + 4]) {
            let value = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3 && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
