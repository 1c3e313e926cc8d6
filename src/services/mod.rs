// Net Automount - Background Services
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Background services for network-aware mounting.
//!
//! This module contains the runtime side of the daemon:
//! - Network monitor: Produces settled, deduplicated network fingerprints
//! - Auto-mount: Drives matching targets through probe, mount and retry
//! - Reconciler: Reads true mount state and recovers zombie mounts
//! - Check pool: Bounded threads for liveness checks on hung mounts
//! - Mounter: Mount facade with credential lookup and conflict handling
//! - Secrets: Encrypted credential vault

pub mod automount;
pub mod check_pool;
pub mod debounce;
pub mod encryption;
pub mod mount_primitive;
pub mod mounter;
pub mod network_monitor;
pub mod reachability;
pub mod reconciler;
pub mod secrets;

#[cfg(test)]
pub mod testing;

pub use automount::{AutoMountService, RetryPolicy};
pub use mount_primitive::SystemMounter;
pub use mounter::MountManager;
pub use network_monitor::{NetworkIntrospector, NetworkMonitor, PollingIntrospector};
pub use reachability::{Reachability, TcpProbe};
pub use secrets::{SecretStore, VaultSecretStore};
