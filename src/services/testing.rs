// Net Automount - Test Doubles
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::mount_primitive::{MountEntry, MountPrimitive};
use super::network_monitor::{NetworkIntrospector, PathUpdate, WifiDetails};
use super::reachability::{ProbeOutcome, Reachability};
use super::secrets::SecretStore;
use crate::models::{Credentials, Error, MountTarget, Result, ShareUrl};
use crate::storage::TargetStore;

// ============================================================================
// Reachability
// ============================================================================

/// Probe returning a fixed outcome after an optional delay.
///
/// The delay ignores cancellation, so a probe started before a cancel can
/// still complete afterwards.
pub struct FakeProbe {
    outcome: ProbeOutcome,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeProbe {
    pub fn always(outcome: ProbeOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reachability for FakeProbe {
    async fn probe(&self, _host: &str, _port: u16, _timeout: Duration, _cancel: &CancellationToken) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

// ============================================================================
// Mount primitive
// ============================================================================

/// Scripted mount primitive that records every call.
///
/// Mount results are taken from the script in order; once it runs dry every
/// mount succeeds at `/mnt/<mount name>`.
#[derive(Default)]
pub struct FakeMounter {
    script: Mutex<VecDeque<Result<PathBuf>>>,
    mounts: Mutex<Vec<MountEntry>>,
    mount_calls: AtomicUsize,
    delay: Mutex<Duration>,
    unmounts: Mutex<Vec<(PathBuf, bool)>>,
    credentials: Mutex<Vec<Option<Credentials>>>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_mounts(&self, results: Vec<Result<PathBuf>>) {
        self.script.lock().unwrap().extend(results);
    }

    /// Make every later mount call take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn add_mount(&self, entry: MountEntry) {
        self.mounts.lock().unwrap().push(entry);
    }

    pub fn mount_calls(&self) -> usize {
        self.mount_calls.load(Ordering::SeqCst)
    }

    pub fn unmount_calls(&self) -> Vec<(PathBuf, bool)> {
        self.unmounts.lock().unwrap().clone()
    }

    pub fn last_credentials(&self) -> Option<Option<Credentials>> {
        self.credentials.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MountPrimitive for FakeMounter {
    async fn mount(&self, url: &ShareUrl, credentials: Option<&Credentials>) -> Result<PathBuf> {
        self.mount_calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().unwrap().push(credentials.cloned());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| {
            Ok(PathBuf::from("/mnt").join(url.mount_name()))
        });

        if let Ok(path) = &result {
            let mut mounts = self.mounts.lock().unwrap();
            if !mounts.iter().any(|entry| &entry.path == path) {
                mounts.push(MountEntry {
                    path: path.clone(),
                    source_hint: url.to_string(),
                    fs_type: "cifs".into(),
                });
            }
        }
        result
    }

    async fn unmount(&self, path: &Path, force: bool) -> Result<()> {
        self.unmounts.lock().unwrap().push((path.to_path_buf(), force));
        self.mounts.lock().unwrap().retain(|entry| entry.path != path);
        Ok(())
    }

    async fn list_mounts(&self) -> Result<Vec<MountEntry>> {
        Ok(self.mounts.lock().unwrap().clone())
    }
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl SecretStore for MemorySecretStore {
    fn save(&self, secret: &str, reference: &str) -> Result<String> {
        self.secrets
            .lock()
            .unwrap()
            .insert(reference.to_string(), secret.to_string());
        Ok(reference.to_string())
    }

    fn retrieve(&self, reference: &str) -> Option<String> {
        self.secrets.lock().unwrap().get(reference).cloned()
    }

    fn delete(&self, reference: &str) {
        self.secrets.lock().unwrap().remove(reference);
    }
}

#[derive(Default)]
pub struct MemoryTargets {
    targets: Mutex<Vec<MountTarget>>,
}

impl MemoryTargets {
    pub fn with(targets: Vec<MountTarget>) -> Self {
        Self {
            targets: Mutex::new(targets),
        }
    }
}

impl TargetStore for MemoryTargets {
    fn load_targets(&self) -> Result<Vec<MountTarget>> {
        Ok(self.targets.lock().unwrap().clone())
    }

    fn save_targets(&self, targets: &[MountTarget]) -> Result<()> {
        *self.targets.lock().unwrap() = targets.to_vec();
        Ok(())
    }
}

// ============================================================================
// Network introspection
// ============================================================================

/// Introspector fed from a test-owned channel.
pub struct ScriptedIntrospector {
    updates: Mutex<Option<mpsc::Receiver<PathUpdate>>>,
    wifi: Mutex<Option<WifiDetails>>,
    gateway: Mutex<Option<String>>,
    wifi_queries: AtomicUsize,
}

impl ScriptedIntrospector {
    /// Create the introspector and the sender that drives it.
    pub fn new() -> (Self, mpsc::Sender<PathUpdate>) {
        let (tx, rx) = mpsc::channel(16);
        let introspector = Self {
            updates: Mutex::new(Some(rx)),
            wifi: Mutex::new(None),
            gateway: Mutex::new(None),
            wifi_queries: AtomicUsize::new(0),
        };
        (introspector, tx)
    }

    pub fn set_wifi(&self, ssid: Option<&str>) {
        *self.wifi.lock().unwrap() = ssid.map(|ssid| WifiDetails {
            ssid: ssid.to_string(),
            bssid: None,
        });
    }

    pub fn set_gateway(&self, mac: Option<&str>) {
        *self.gateway.lock().unwrap() = mac.map(str::to_string);
    }

    pub fn wifi_queries(&self) -> usize {
        self.wifi_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkIntrospector for ScriptedIntrospector {
    async fn path_updates(&self) -> Result<mpsc::Receiver<PathUpdate>> {
        self.updates
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Internal("path updates already taken".into()))
    }

    async fn wifi_details(&self) -> Option<WifiDetails> {
        self.wifi_queries.fetch_add(1, Ordering::SeqCst);
        self.wifi.lock().unwrap().clone()
    }

    async fn gateway_mac(&self) -> Option<String> {
        self.gateway.lock().unwrap().clone()
    }
}
