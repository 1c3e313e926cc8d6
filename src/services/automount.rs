// Net Automount - Auto-Mount Service
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Auto-mount orchestrator.
//!
//! Consumes fingerprint changes, waits for the network to settle and runs
//! one evaluation pass per distinct settled value. An evaluation pass
//! cancels every outstanding attempt cycle, then starts a fresh cycle for
//! each target with an enabled rule matching the new network.
//!
//! Each cycle runs as its own task:
//!
//! ```text
//! Probing -> Mounting -> Mounted
//!    |          |
//!    +----------+--> RetryScheduled --(retry delay)--> Probing
//!                         |
//!                         +--> GivenUp (after max_attempts)
//! ```
//!
//! Cancellation is cooperative. The cycle checks its token before every
//! side-effecting step and drops results of steps that were in flight when
//! the token fired. Status updates are tagged with the cycle's generation
//! so a superseded cycle can never overwrite the status of its successor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::debounce::Debouncer;
use super::mounter::MountManager;
use super::reachability::{ProbeOutcome, Reachability};
use crate::models::{AppConfig, AttemptPhase, Error, MountTarget, NetworkFingerprint, TargetStatus};
use crate::storage::TargetStore;

/// Default settle window before an evaluation pass.
pub const DEFAULT_EVALUATION_DEBOUNCE: Duration = Duration::from_secs(2);

/// Bounds of one attempt cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total probes per cycle before giving up.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub retry_delay: Duration,
    /// Reachability probe timeout.
    pub probe_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            probe_timeout: config.probe_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

// ============================================================================
// Status board
// ============================================================================

/// Shared, generation-checked view of every target's attempt status.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<HashMap<Uuid, (u64, TargetStatus)>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_write<R>(&self, writer: impl FnOnce(&mut HashMap<Uuid, (u64, TargetStatus)>) -> R) -> R {
        match self.inner.write() {
            Ok(mut guard) => writer(&mut guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing status board, recovering");
                writer(&mut poisoned.into_inner())
            }
        }
    }

    fn with_read<R>(&self, reader: impl FnOnce(&HashMap<Uuid, (u64, TargetStatus)>) -> R) -> R {
        match self.inner.read() {
            Ok(guard) => reader(&guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading status board, recovering");
                reader(&poisoned.into_inner())
            }
        }
    }

    /// Claim a target for a new cycle generation.
    fn begin(&self, id: Uuid, generation: u64) {
        self.with_write(|map| {
            map.insert(id, (generation, TargetStatus::default()));
        });
    }

    /// Apply `change` if `generation` still owns the target.
    fn update(&self, id: Uuid, generation: u64, change: impl FnOnce(&mut TargetStatus)) -> bool {
        self.with_write(|map| match map.get_mut(&id) {
            Some((current, status)) if *current == generation => {
                change(status);
                status.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    /// Return a cancelled target to Idle, keeping nothing from its cycle.
    fn reset(&self, id: Uuid, generation: u64) {
        self.update(id, generation, |status| {
            *status = TargetStatus::default();
        });
    }

    /// Status of one target (Idle if it never ran).
    #[cfg(test)]
    fn get(&self, id: Uuid) -> TargetStatus {
        self.with_read(|map| map.get(&id).map(|(_, status)| status.clone()))
            .unwrap_or_default()
    }

    /// Status of every target that has run at least once.
    pub fn snapshot(&self) -> HashMap<Uuid, TargetStatus> {
        self.with_read(|map| {
            map.iter()
                .map(|(id, (_, status))| (*id, status.clone()))
                .collect()
        })
    }
}

// ============================================================================
// Attempt cycles
// ============================================================================

/// Live attempt cycle of one target.
struct AttemptState {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

type AttemptMap = Arc<Mutex<HashMap<Uuid, AttemptState>>>;

fn lock_attempts(attempts: &Mutex<HashMap<Uuid, AttemptState>>) -> MutexGuard<'_, HashMap<Uuid, AttemptState>> {
    match attempts.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Attempt table lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Everything a cycle task needs, cheap to clone into the task.
#[derive(Clone)]
struct CycleWorker {
    probe: Arc<dyn Reachability>,
    mounts: Arc<MountManager>,
    policy: RetryPolicy,
    status: StatusBoard,
    attempts: AttemptMap,
}

impl CycleWorker {
    async fn run_cycle(self, target: MountTarget, generation: u64, cancel: CancellationToken) {
        let id = target.id;
        let port = target.probe_port();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                break;
            }
            self.status.update(id, generation, |s| {
                s.phase = AttemptPhase::Probing;
                s.attempt = attempt;
            });
            info!(
                "Attempting auto-mount for {} (attempt {}/{})",
                target.alias, attempt, self.policy.max_attempts
            );

            let outcome = self
                .probe
                .probe(&target.hostname, port, self.policy.probe_timeout, &cancel)
                .await;
            if cancel.is_cancelled() || outcome == ProbeOutcome::Cancelled {
                break;
            }

            let failure = if outcome.is_reachable() {
                self.status.update(id, generation, |s| s.phase = AttemptPhase::Mounting);
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = self.mounts.mount(&target) => Some(result),
                };
                let Some(result) = result.filter(|_| !cancel.is_cancelled()) else {
                    debug!("Abandoning mount for superseded cycle of {}", target.alias);
                    break;
                };
                match result {
                    Ok(path) => {
                        info!("Successfully mounted {} at {:?}", target.alias, path);
                        self.status.update(id, generation, |s| {
                            s.phase = AttemptPhase::Mounted;
                            s.mount_path = Some(path);
                            s.last_error = None;
                        });
                        break;
                    }
                    Err(e) => e,
                }
            } else {
                Error::Unreachable(format!("{}:{} {}", target.hostname, port, outcome))
            };

            warn!("Auto-mount of {} failed: {}", target.alias, failure);
            let message = failure.to_string();

            if attempt >= self.policy.max_attempts || !failure.is_retryable() {
                let exhausted = Error::RetriesExhausted {
                    alias: target.alias.clone(),
                    attempts: attempt,
                };
                warn!("{}", exhausted);
                self.status.update(id, generation, |s| {
                    s.phase = AttemptPhase::GivenUp;
                    s.last_error = Some(message);
                });
                break;
            }

            self.status.update(id, generation, |s| {
                s.phase = AttemptPhase::RetryScheduled;
                s.last_error = Some(message);
            });
            debug!("Retrying {} in {:?}", target.alias, self.policy.retry_delay);

            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.policy.retry_delay) => false,
            };
            if cancelled {
                break;
            }
        }

        self.finish(id, generation);
    }

    /// Drop the attempt state if it still belongs to this generation.
    fn finish(&self, id: Uuid, generation: u64) {
        let mut attempts = lock_attempts(&self.attempts);
        if attempts.get(&id).map(|a| a.generation) == Some(generation) {
            attempts.remove(&id);
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives targets through probe, mount and retry on network changes.
pub struct AutoMountService {
    targets: Arc<dyn TargetStore>,
    worker: CycleWorker,
    debounce: Duration,
    enabled: bool,
    next_generation: AtomicU64,
}

impl AutoMountService {
    pub fn new(
        targets: Arc<dyn TargetStore>,
        probe: Arc<dyn Reachability>,
        mounts: Arc<MountManager>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            targets,
            worker: CycleWorker {
                probe,
                mounts,
                policy,
                status: StatusBoard::new(),
                attempts: Arc::new(Mutex::new(HashMap::new())),
            },
            debounce: DEFAULT_EVALUATION_DEBOUNCE,
            enabled: true,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Set the settle window applied before each evaluation pass.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Globally enable or disable starting new cycles.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Number of attempt cycles currently alive.
    pub fn active_attempts(&self) -> usize {
        lock_attempts(&self.worker.attempts).len()
    }

    /// Consume fingerprint changes until the channel closes or shutdown.
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<Option<NetworkFingerprint>>,
        shutdown: CancellationToken,
    ) {
        let mut debouncer = Debouncer::new(self.debounce);
        let mut last_evaluated: Option<Option<NetworkFingerprint>> = None;

        info!("Auto-mount service started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Some(fingerprint) => debouncer.push(fingerprint),
                    None => break,
                },
                Some(fingerprint) = debouncer.settled() => {
                    if last_evaluated.as_ref() == Some(&fingerprint) {
                        debug!("Network settled on the same fingerprint, skipping evaluation");
                        continue;
                    }
                    self.evaluate(fingerprint.as_ref());
                    last_evaluated = Some(fingerprint);
                }
            }
        }

        if debouncer.is_pending() {
            debug!("Discarding unsettled network change");
        }
        self.cancel_all();
        info!("Auto-mount service stopped");
    }

    /// One evaluation pass. Returns the number of cycles started.
    pub fn evaluate(&self, fingerprint: Option<&NetworkFingerprint>) -> usize {
        self.cancel_all();

        let Some(fingerprint) = fingerprint else {
            info!("No network: outstanding auto-mount attempts cancelled");
            return 0;
        };
        info!("Evaluating auto-mount for {}", fingerprint.description());

        if !self.enabled {
            debug!("Auto-mount disabled, not starting any attempts");
            return 0;
        }

        let targets = match self.targets.load_targets() {
            Ok(targets) => targets,
            Err(e) => {
                error!("Failed to load mount targets: {}", e);
                return 0;
            }
        };

        let mut started = 0;
        for target in targets {
            if target.matches_network(fingerprint) {
                self.start_attempt(target);
                started += 1;
            }
        }
        started
    }

    /// Start a fresh cycle for a target, replacing any existing one.
    pub fn start_attempt(&self, target: MountTarget) {
        let id = target.id;
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();

        let mut attempts = lock_attempts(&self.worker.attempts);
        if let Some(previous) = attempts.remove(&id) {
            debug!("Replacing attempt cycle of {}", target.alias);
            previous.cancel.cancel();
        }
        self.worker.status.begin(id, generation);

        let handle = tokio::spawn(self.worker.clone().run_cycle(target, generation, cancel.clone()));
        attempts.insert(
            id,
            AttemptState {
                generation,
                cancel,
                handle,
            },
        );
    }

    /// Cancel every outstanding cycle and return its target to Idle.
    pub fn cancel_all(&self) {
        let drained: Vec<(Uuid, AttemptState)> = lock_attempts(&self.worker.attempts).drain().collect();
        for (id, attempt) in drained {
            attempt.cancel.cancel();
            self.worker.status.reset(id, attempt.generation);
        }
    }

    /// Phase of every configured target that has run a cycle, by alias.
    pub fn report(&self) -> Vec<(String, TargetStatus)> {
        let statuses = self.worker.status.snapshot();
        let targets = match self.targets.load_targets() {
            Ok(targets) => targets,
            Err(e) => {
                warn!("Failed to load mount targets for status report: {}", e);
                return Vec::new();
            }
        };
        targets
            .into_iter()
            .filter_map(|target| statuses.get(&target.id).map(|status| (target.alias, status.clone())))
            .collect()
    }

    /// Log the final status of each target, cancel everything and wait for
    /// the cycle tasks to wind down.
    pub async fn shutdown(&self) {
        for (alias, status) in self.report() {
            match status.mount_path {
                Some(path) => info!("{}: {} at {:?}", alias, status.phase.as_str(), path),
                None => info!("{}: {}", alias, status.phase.as_str()),
            }
        }
        let active = self.active_attempts();
        if active > 0 {
            info!("Cancelling {} outstanding attempt(s)", active);
        }

        let drained: Vec<(Uuid, AttemptState)> = lock_attempts(&self.worker.attempts).drain().collect();
        for (id, attempt) in drained {
            attempt.cancel.cancel();
            self.worker.status.reset(id, attempt.generation);
            if let Err(e) = attempt.handle.await {
                warn!("Attempt task ended abnormally: {}", e);
            }
        }
    }
}
