// Net Automount - Mount Manager
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Mount facade used by the orchestrator and the command-line front end.
//!
//! Resolves credentials at mount time, routes "already mounted" rejections
//! through the reconciler and picks graceful or forced unmounts based on
//! the observed liveness.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::mount_primitive::MountPrimitive;
use super::reconciler::MountReconciler;
use super::secrets::SecretStore;
use crate::models::{Credentials, MountLiveness, MountRecord, MountTarget, Result};

/// Mounts and unmounts configured targets.
pub struct MountManager {
    primitive: Arc<dyn MountPrimitive>,
    reconciler: MountReconciler,
    secrets: Arc<dyn SecretStore>,
}

impl MountManager {
    /// Create a manager with the default reconciler.
    pub fn new(
        primitive: Arc<dyn MountPrimitive>,
        secrets: Arc<dyn SecretStore>,
        liveness_timeout: Duration,
    ) -> Self {
        let reconciler = MountReconciler::new(Arc::clone(&primitive), liveness_timeout);
        Self::with_reconciler(primitive, reconciler, secrets)
    }

    /// Create a manager with a custom reconciler.
    pub fn with_reconciler(
        primitive: Arc<dyn MountPrimitive>,
        reconciler: MountReconciler,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            primitive,
            reconciler,
            secrets,
        }
    }

    /// Resolve credentials for a target from the secret store.
    ///
    /// Targets without a user name mount as guest.
    pub fn credentials_for(&self, target: &MountTarget) -> Option<Credentials> {
        let username = target.username.clone().filter(|u| !u.is_empty())?;
        let password = target
            .secret_ref
            .as_deref()
            .and_then(|reference| self.secrets.retrieve(reference));
        if password.is_none() && target.secret_ref.is_some() {
            debug!("No stored password for {}", target.alias);
        }
        Some(Credentials { username, password })
    }

    /// Mount a target, resolving "already mounted" conflicts.
    pub async fn mount(&self, target: &MountTarget) -> Result<PathBuf> {
        let url = target.access_url()?;
        let credentials = self.credentials_for(target);

        match self.primitive.mount(&url, credentials.as_ref()).await {
            Ok(path) => {
                info!("Mounted {} at {:?}", target.alias, path);
                Ok(path)
            }
            Err(e) if e.is_conflict() => {
                debug!("{} reported as already mounted, reconciling", target.alias);
                self.reconciler.resolve_conflict(&url, credentials.as_ref()).await
            }
            Err(e) => Err(e),
        }
    }

    /// Unmount a target. Returns `false` when it was not mounted.
    pub async fn unmount(&self, target: &MountTarget) -> Result<bool> {
        let record = self.reconciler.inspect(target).await?;
        let Some(path) = record.mount_path else {
            info!("{} is not mounted", target.alias);
            return Ok(false);
        };

        let force = record.liveness == MountLiveness::Zombie;
        self.primitive.unmount(&path, force).await?;
        info!("Unmounted {} from {:?}", target.alias, path);
        Ok(true)
    }

    /// Current mount state of a target.
    pub async fn status(&self, target: &MountTarget) -> Result<MountRecord> {
        self.reconciler.inspect(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::models::{Error, NetworkProtocol, EEXIST};
    use crate::services::mount_primitive::MountEntry;
    use crate::services::testing::{FakeMounter, MemorySecretStore};

    fn manager(mounter: &Arc<FakeMounter>, secrets: Arc<MemorySecretStore>, readable: bool) -> MountManager {
        let reconciler = MountReconciler::new(mounter.clone(), Duration::from_millis(200))
            .with_access_check(Arc::new(move |_: &Path| readable));
        MountManager::with_reconciler(mounter.clone(), reconciler, secrets)
    }

    fn target() -> MountTarget {
        let mut target = MountTarget::new("NAS", NetworkProtocol::Smb, "nas.local", "Shared");
        target.username = Some("jane".into());
        target.secret_ref = Some("nas-jane".into());
        target
    }

    #[tokio::test]
    async fn test_credentials_resolved_at_mount_time() {
        let mounter = Arc::new(FakeMounter::new());
        let secrets = Arc::new(MemorySecretStore::default());
        let manager = manager(&mounter, secrets.clone(), true);

        secrets.save("hunter2", "nas-jane").unwrap();
        manager.mount(&target()).await.unwrap();

        let credentials = mounter.last_credentials().unwrap().unwrap();
        assert_eq!(credentials.username, "jane");
        assert_eq!(credentials.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_guest_target_has_no_credentials() {
        let mounter = Arc::new(FakeMounter::new());
        let manager = manager(&mounter, Arc::new(MemorySecretStore::default()), true);
        let guest = MountTarget::new("Public", NetworkProtocol::Smb, "nas.local", "Public");
        assert!(manager.credentials_for(&guest).is_none());
    }

    #[tokio::test]
    async fn test_conflict_goes_through_reconciler() {
        let mounter = Arc::new(FakeMounter::new());
        mounter.add_mount(MountEntry {
            path: PathBuf::from("/media/Shared"),
            source_hint: "//nas.local/Shared".into(),
            fs_type: "cifs".into(),
        });
        mounter.script_mounts(vec![Err(Error::MountRejected { code: EEXIST })]);
        let manager = manager(&mounter, Arc::new(MemorySecretStore::default()), true);

        let path = manager.mount(&target()).await.unwrap();
        assert_eq!(path, PathBuf::from("/media/Shared"));
        assert_eq!(mounter.mount_calls(), 1);
    }

    #[tokio::test]
    async fn test_other_rejections_pass_through() {
        let mounter = Arc::new(FakeMounter::new());
        mounter.script_mounts(vec![Err(Error::MountRejected { code: 13 })]);
        let manager = manager(&mounter, Arc::new(MemorySecretStore::default()), true);

        let result = manager.mount(&target()).await;
        assert!(matches!(result, Err(Error::MountRejected { code: 13 })));
    }

    #[tokio::test]
    async fn test_share_less_ftp_target_status_and_unmount() {
        let mounter = Arc::new(FakeMounter::new());
        mounter.add_mount(MountEntry {
            path: PathBuf::from("/mnt/ftp.local"),
            source_hint: "ftp://ftp.local/".into(),
            fs_type: "fuse.curlftpfs".into(),
        });
        let manager = manager(&mounter, Arc::new(MemorySecretStore::default()), true);
        let ftp = MountTarget::new("FTP", NetworkProtocol::Ftp, "ftp.local", "/");

        let record = manager.status(&ftp).await.unwrap();
        assert_eq!(record.liveness, MountLiveness::Live);
        assert_eq!(record.mount_path, Some(PathBuf::from("/mnt/ftp.local")));

        assert!(manager.unmount(&ftp).await.unwrap());
        assert_eq!(
            mounter.unmount_calls(),
            vec![(PathBuf::from("/mnt/ftp.local"), false)]
        );
    }

    #[tokio::test]
    async fn test_unmount_graceful_or_forced() {
        let mounter = Arc::new(FakeMounter::new());
        let secrets = Arc::new(MemorySecretStore::default());

        let live = manager(&mounter, secrets.clone(), true);
        assert!(!live.unmount(&target()).await.unwrap());

        live.mount(&target()).await.unwrap();
        assert!(live.unmount(&target()).await.unwrap());

        let stale = manager(&mounter, secrets, false);
        stale.mount(&target()).await.unwrap();
        assert!(stale.unmount(&target()).await.unwrap());

        assert_eq!(
            mounter.unmount_calls(),
            vec![
                (PathBuf::from("/mnt/Shared"), false),
                (PathBuf::from("/mnt/Shared"), true),
            ]
        );
    }
}
