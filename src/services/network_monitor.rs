// Net Automount - Network Monitor
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Fingerprint producer.
//!
//! Consumes raw path updates from a [`NetworkIntrospector`], waits for them
//! to settle, turns the settled update into a [`NetworkFingerprint`] and
//! publishes it when it differs from the last published value. An
//! unsatisfied path publishes `None`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::debounce::Debouncer;
use crate::models::{InterfaceType, NetworkFingerprint, Result};
use crate::network_utils;

/// Whether the host currently has a usable route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    Satisfied,
    Unsatisfied,
}

/// One raw network-path observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathUpdate {
    pub status: PathStatus,
    /// Type of the interface carrying the default route.
    pub interface: InterfaceType,
}

impl PathUpdate {
    pub fn satisfied(interface: InterfaceType) -> Self {
        Self {
            status: PathStatus::Satisfied,
            interface,
        }
    }

    pub fn unsatisfied() -> Self {
        Self {
            status: PathStatus::Unsatisfied,
            interface: InterfaceType::Other,
        }
    }
}

/// Details of the associated Wi-Fi network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiDetails {
    pub ssid: String,
    pub bssid: Option<String>,
}

/// Source of network-path information.
#[async_trait]
pub trait NetworkIntrospector: Send + Sync {
    /// Push stream of path updates. The first update reflects the state at
    /// subscription time.
    async fn path_updates(&self) -> Result<mpsc::Receiver<PathUpdate>>;

    /// Wi-Fi details of the active interface, if any.
    async fn wifi_details(&self) -> Option<WifiDetails>;

    /// Hardware address of the default gateway.
    async fn gateway_mac(&self) -> Option<String>;
}

// ============================================================================
// Producer
// ============================================================================

/// Produces deduplicated fingerprints from an introspector.
pub struct NetworkMonitor {
    introspector: Arc<dyn NetworkIntrospector>,
    settle: Duration,
}

impl NetworkMonitor {
    pub fn new(introspector: Arc<dyn NetworkIntrospector>, settle: Duration) -> Self {
        Self { introspector, settle }
    }

    /// Build the fingerprint for a settled path update.
    ///
    /// Wi-Fi details are only queried when the active interface is Wi-Fi.
    pub async fn fingerprint_for(&self, update: &PathUpdate) -> Option<NetworkFingerprint> {
        if update.status == PathStatus::Unsatisfied {
            return None;
        }

        let mut fingerprint = NetworkFingerprint {
            interface_type: update.interface,
            ..NetworkFingerprint::default()
        };
        if update.interface == InterfaceType::Wifi {
            if let Some(wifi) = self.introspector.wifi_details().await {
                fingerprint.ssid = Some(wifi.ssid);
                fingerprint.bssid = wifi.bssid;
            }
        }
        fingerprint.gateway_mac = self.introspector.gateway_mac().await;
        Some(fingerprint)
    }

    /// Take a single fingerprint sample (for one-shot commands).
    pub async fn sample_once(&self, limit: Duration) -> Result<Option<NetworkFingerprint>> {
        let mut updates = self.introspector.path_updates().await?;
        match timeout(limit, updates.recv()).await {
            Ok(Some(update)) => Ok(self.fingerprint_for(&update).await),
            Ok(None) | Err(_) => {
                warn!("No network path information available");
                Ok(None)
            }
        }
    }

    /// Publish fingerprint changes into `tx` until shutdown or until either
    /// end of the pipeline goes away.
    pub async fn run(
        &self,
        tx: mpsc::Sender<Option<NetworkFingerprint>>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut updates = self.introspector.path_updates().await?;
        let mut debouncer = Debouncer::new(self.settle);
        let mut last_published: Option<Option<NetworkFingerprint>> = None;

        info!("Network monitor started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                update = updates.recv() => match update {
                    Some(update) => {
                        debug!("Path update: {:?}", update);
                        debouncer.push(update);
                    }
                    None => {
                        warn!("Network path stream closed");
                        break;
                    }
                },
                Some(update) = debouncer.settled() => {
                    let fingerprint = self.fingerprint_for(&update).await;
                    if last_published.as_ref() == Some(&fingerprint) {
                        debug!("Network unchanged");
                        continue;
                    }
                    match &fingerprint {
                        Some(fp) => info!("Network changed: {}", fp.description()),
                        None => info!("Network lost"),
                    }
                    last_published = Some(fingerprint.clone());
                    if tx.send(fingerprint).await.is_err() {
                        debug!("Fingerprint consumer gone");
                        break;
                    }
                }
            }
        }
        info!("Network monitor stopped");
        Ok(())
    }
}

// ============================================================================
// Polling fallback
// ============================================================================

/// Introspector that samples the routing table periodically.
///
/// Used when the system bus is not reachable.
#[derive(Debug, Clone)]
pub struct PollingIntrospector {
    interval: Duration,
}

impl PollingIntrospector {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl NetworkIntrospector for PollingIntrospector {
    async fn path_updates(&self) -> Result<mpsc::Receiver<PathUpdate>> {
        let (tx, rx) = mpsc::channel(8);
        let interval = self.interval;
        tokio::spawn(async move {
            loop {
                let update = network_utils::sample_path().await;
                if tx.send(update).await.is_err() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
        Ok(rx)
    }

    async fn wifi_details(&self) -> Option<WifiDetails> {
        network_utils::active_wifi().await
    }

    async fn gateway_mac(&self) -> Option<String> {
        network_utils::gateway_mac().await
    }
}
