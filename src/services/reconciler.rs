// Net Automount - Mount State Reconciler
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Mount state reconciliation.
//!
//! Reads the live OS mount table, correlates an entry to a target and
//! decides whether it is live, a zombie (present but unresponsive) or
//! absent. Nothing is cached: every call re-enumerates the mount table
//! immediately before acting on it.
//!
//! Correlation compares the last segment of the share path against the
//! last segment of each mount point. Two targets exporting the same share
//! name from different hosts cannot be told apart this way.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::check_pool::{BoundedCheckPool, CheckError};
use super::mount_primitive::{MountEntry, MountPrimitive};
use crate::models::{Credentials, Error, MountLiveness, MountRecord, MountTarget, Result, ShareUrl};

/// Blocking readability check run against a mount point.
pub type AccessCheck = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Try to list the directory. An empty listing counts, a failed read does not.
pub fn is_directory_readable(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| !matches!(entries.next(), Some(Err(_))))
        .unwrap_or(false)
}

/// Find the mount entry that most likely belongs to a share.
pub fn correlate<'a>(share_name: Option<&str>, mounts: &'a [MountEntry]) -> Option<&'a MountEntry> {
    let share_name = share_name?;
    mounts
        .iter()
        .find(|entry| entry.last_segment() == Some(share_name))
}

/// Inspects and repairs OS-level mounts.
#[derive(Clone)]
pub struct MountReconciler {
    primitive: Arc<dyn MountPrimitive>,
    liveness_timeout: Duration,
    access_check: AccessCheck,
    checks: BoundedCheckPool,
}

impl MountReconciler {
    /// Create a reconciler using a real directory listing as liveness check.
    pub fn new(primitive: Arc<dyn MountPrimitive>, liveness_timeout: Duration) -> Self {
        Self {
            primitive,
            liveness_timeout,
            access_check: Arc::new(is_directory_readable),
            checks: BoundedCheckPool::default(),
        }
    }

    /// Replace the liveness check.
    #[cfg(test)]
    pub fn with_access_check(mut self, access_check: AccessCheck) -> Self {
        self.access_check = access_check;
        self
    }

    #[cfg(test)]
    fn with_check_pool(mut self, checks: BoundedCheckPool) -> Self {
        self.checks = checks;
        self
    }

    /// Determine the current mount state of a target.
    pub async fn inspect(&self, target: &MountTarget) -> Result<MountRecord> {
        let url = target.access_url()?;
        let mounts = self.primitive.list_mounts().await?;
        let Some(entry) = correlate(Some(url.mount_name()), &mounts) else {
            return Ok(MountRecord::absent());
        };
        let liveness = self.check_liveness(&entry.path).await;
        debug!("{} -> {:?} ({})", target.alias, entry.path, liveness.as_str());
        Ok(MountRecord::new(entry.path.clone(), liveness))
    }

    /// Check a mount point with a hard wall-clock ceiling.
    ///
    /// The check runs on its own thread; if it does not finish within the
    /// liveness timeout the thread is abandoned and the mount is a zombie.
    /// While too many abandoned checks are still blocked, mounts are
    /// reported as zombies without checking.
    pub async fn check_liveness(&self, path: &Path) -> MountLiveness {
        let check = Arc::clone(&self.access_check);
        let owned = path.to_path_buf();
        let result = self
            .checks
            .run_with_timeout(self.liveness_timeout, move || check(&owned))
            .await;

        match result {
            Ok(true) => MountLiveness::Live,
            Ok(false) => {
                debug!("{:?} is not readable", path);
                MountLiveness::Zombie
            }
            Err(CheckError::TimedOut) => {
                warn!("Liveness check for {:?} timed out", path);
                MountLiveness::Zombie
            }
            Err(e) => {
                warn!("Liveness check for {:?} not run: {}", path, e);
                MountLiveness::Zombie
            }
        }
    }

    /// Resolve an "already mounted" rejection for `url`.
    ///
    /// A live correlated mount is adopted as-is. A zombie is force-unmounted
    /// and the mount is retried exactly once.
    pub async fn resolve_conflict(
        &self,
        url: &ShareUrl,
        credentials: Option<&Credentials>,
    ) -> Result<PathBuf> {
        let mounts = self.primitive.list_mounts().await?;
        let share = url.mount_name();
        let Some(entry) = correlate(Some(share), &mounts) else {
            warn!("Mount of {} conflicts but no matching mount exists", url);
            return Err(Error::MountConflict(share.to_string()));
        };
        let path = entry.path.clone();

        match self.check_liveness(&path).await {
            MountLiveness::Live => {
                info!("{} is already mounted at {:?}", url, path);
                Ok(path)
            }
            MountLiveness::Zombie | MountLiveness::Absent => {
                warn!("Recovering stale mount at {:?}", path);
                if let Err(e) = self.primitive.unmount(&path, true).await {
                    warn!("Forced unmount of {:?} failed: {}", path, e);
                }
                match self.primitive.mount(url, credentials).await {
                    Ok(mounted) => {
                        info!("Recovered {} at {:?}", url, mounted);
                        Ok(mounted)
                    }
                    Err(e) => {
                        let code = match e {
                            Error::MountRejected { code } => code,
                            _ => -1,
                        };
                        Err(Error::ZombieRecoveryFailed { path, code })
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for MountReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountReconciler")
            .field("liveness_timeout", &self.liveness_timeout)
            .field("checks", &self.checks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NetworkProtocol, EEXIST};
    use crate::services::mount_primitive::MountPrimitive;
    use crate::services::testing::FakeMounter;

    fn entry(path: &str) -> MountEntry {
        MountEntry {
            path: PathBuf::from(path),
            source_hint: String::new(),
            fs_type: "cifs".into(),
        }
    }

    fn target() -> MountTarget {
        MountTarget::new("NAS", NetworkProtocol::Smb, "nas.local", "//Shared//")
    }

    fn reconciler(mounter: &Arc<FakeMounter>, readable: bool) -> MountReconciler {
        MountReconciler::new(mounter.clone(), Duration::from_millis(200))
            .with_access_check(Arc::new(move |_: &Path| readable))
    }

    #[test]
    fn test_correlate_by_last_segment() {
        let mounts = vec![entry("/mnt/Media"), entry("/home/jane/Shares/Shared")];
        assert_eq!(
            correlate(Some("Shared"), &mounts).map(|e| e.path.clone()),
            Some(PathBuf::from("/home/jane/Shares/Shared"))
        );
        assert!(correlate(Some("Backups"), &mounts).is_none());
        assert!(correlate(None, &mounts).is_none());
    }

    #[tokio::test]
    async fn test_inspect_states() {
        let mounter = Arc::new(FakeMounter::new());
        assert_eq!(
            reconciler(&mounter, true).inspect(&target()).await.unwrap(),
            MountRecord::absent()
        );

        mounter.add_mount(entry("/mnt/Shared"));
        let live = reconciler(&mounter, true).inspect(&target()).await.unwrap();
        assert_eq!(live, MountRecord::new(PathBuf::from("/mnt/Shared"), MountLiveness::Live));

        let zombie = reconciler(&mounter, false).inspect(&target()).await.unwrap();
        assert_eq!(zombie.liveness, MountLiveness::Zombie);
    }

    #[tokio::test]
    async fn test_hanging_check_is_zombie() {
        let mounter = Arc::new(FakeMounter::new());
        let reconciler = MountReconciler::new(mounter, Duration::from_millis(50)).with_access_check(
            Arc::new(|_: &Path| {
                std::thread::sleep(Duration::from_millis(500));
                true
            }),
        );
        assert_eq!(
            reconciler.check_liveness(Path::new("/mnt/Shared")).await,
            MountLiveness::Zombie
        );
    }

    #[tokio::test]
    async fn test_exhausted_check_pool_reports_zombie_without_waiting() {
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = Arc::new(std::sync::Mutex::new(release_rx));
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let check_calls = Arc::clone(&calls);
        let reconciler = MountReconciler::new(Arc::new(FakeMounter::new()), Duration::from_millis(200))
            .with_check_pool(BoundedCheckPool::new(1))
            .with_access_check(Arc::new(move |_: &Path| {
                check_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let _ = release_rx.lock().unwrap().recv();
                true
            }));

        let path = Path::new("/mnt/Shared");
        assert_eq!(reconciler.check_liveness(path).await, MountLiveness::Zombie);

        let started = std::time::Instant::now();
        assert_eq!(reconciler.check_liveness(path).await, MountLiveness::Zombie);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        drop(release_tx);
    }

    #[test]
    fn test_directory_readability() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_directory_readable(dir.path()));

        std::fs::write(dir.path().join("movie.mkv"), b"").unwrap();
        assert!(is_directory_readable(dir.path()));

        assert!(!is_directory_readable(&dir.path().join("missing")));
        assert!(!is_directory_readable(&dir.path().join("movie.mkv")));
    }

    #[tokio::test]
    async fn test_share_less_target_correlates_by_host() {
        let mounter = Arc::new(FakeMounter::new());
        mounter.add_mount(entry("/mnt/ftp.local"));
        let ftp = MountTarget::new("FTP", NetworkProtocol::Ftp, "ftp.local", "/");

        let record = reconciler(&mounter, true).inspect(&ftp).await.unwrap();
        assert_eq!(record, MountRecord::new(PathBuf::from("/mnt/ftp.local"), MountLiveness::Live));
    }

    #[tokio::test]
    async fn test_conflict_with_live_mount_adopts_it() {
        let mounter = Arc::new(FakeMounter::new());
        mounter.add_mount(entry("/mnt/Shared"));

        let path = reconciler(&mounter, true)
            .resolve_conflict(&target().access_url().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/mnt/Shared"));
        assert_eq!(mounter.mount_calls(), 0);
        assert!(mounter.unmount_calls().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_without_correlated_mount() {
        let mounter = Arc::new(FakeMounter::new());
        let result = reconciler(&mounter, true)
            .resolve_conflict(&target().access_url().unwrap(), None)
            .await;
        assert!(matches!(result, Err(Error::MountConflict(ref name)) if name == "Shared"));
    }

    #[tokio::test]
    async fn test_zombie_is_force_unmounted_then_retried_once() {
        let mounter = Arc::new(FakeMounter::new());
        mounter.add_mount(entry("/mnt/Shared"));
        mounter.script_mounts(vec![
            Err(Error::MountRejected { code: EEXIST }),
            Err(Error::MountRejected { code: 13 }),
        ]);
        let url = target().access_url().unwrap();
        let reconciler = reconciler(&mounter, false);

        // The first mount call is the one that produced the conflict.
        let first = mounter.mount(&url, None).await;
        assert!(matches!(first, Err(ref e) if e.is_conflict()));

        let result = reconciler.resolve_conflict(&url, None).await;
        assert!(matches!(
            result,
            Err(Error::ZombieRecoveryFailed { ref path, code: 13 }) if path == Path::new("/mnt/Shared")
        ));
        assert_eq!(mounter.unmount_calls(), vec![(PathBuf::from("/mnt/Shared"), true)]);
        assert_eq!(mounter.mount_calls(), 2);
    }

    #[tokio::test]
    async fn test_zombie_recovery_succeeds() {
        let mounter = Arc::new(FakeMounter::new());
        mounter.add_mount(entry("/mnt/Shared"));

        let path = reconciler(&mounter, false)
            .resolve_conflict(&target().access_url().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/mnt/Shared"));
        assert_eq!(mounter.mount_calls(), 1);
    }
}
