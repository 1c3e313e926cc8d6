// Net Automount - Bounded Check Pool
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Dedicated threads for blocking checks against possibly dead mounts.
//!
//! A `read_dir` on a hung network mount can sit in uninterruptible sleep
//! forever. Each check therefore runs on its own OS thread, away from the
//! runtime's blocking pool, and is abandoned when its time limit expires.
//! Abandoned threads stay counted until they return; once `max_blocked`
//! are outstanding, new checks are refused without spawning anything.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::warn;

/// Outstanding check threads allowed before new checks are refused.
pub const MAX_BLOCKED_CHECKS: usize = 8;

/// Why a bounded check produced no result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("{blocked} check threads are still blocked")]
    Exhausted { blocked: usize },

    #[error("check timed out")]
    TimedOut,

    #[error("check thread failed: {0}")]
    Failed(String),
}

/// Releases a slot when the check thread ends, including by panic.
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs blocking checks on bounded, individually spawned threads.
#[derive(Debug, Clone)]
pub struct BoundedCheckPool {
    max_blocked: usize,
    blocked: Arc<AtomicUsize>,
}

impl Default for BoundedCheckPool {
    fn default() -> Self {
        Self::new(MAX_BLOCKED_CHECKS)
    }
}

impl BoundedCheckPool {
    pub fn new(max_blocked: usize) -> Self {
        Self {
            max_blocked: max_blocked.max(1),
            blocked: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `op` on a fresh thread and wait at most `limit` for its result.
    pub async fn run_with_timeout<T, F>(&self, limit: Duration, op: F) -> Result<T, CheckError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let max = self.max_blocked;
        if let Err(blocked) = self
            .blocked
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
        {
            warn!(blocked, max, "Refusing check: too many threads blocked on unresponsive mounts");
            return Err(CheckError::Exhausted { blocked });
        }

        let slot = Slot(Arc::clone(&self.blocked));
        let (tx, rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("mount-check".into())
            .spawn(move || {
                let _slot = slot;
                let _ = tx.send(op());
            })
            .map_err(|e| CheckError::Failed(e.to_string()))?;

        match timeout(limit, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(CheckError::Failed("thread ended without a result".into())),
            Err(_) => {
                warn!(
                    blocked = self.blocked_count(),
                    max, "Check timed out, its thread may stay blocked"
                );
                Err(CheckError::TimedOut)
            }
        }
    }

    /// Threads started by this pool that have not returned yet.
    pub fn blocked_count(&self) -> usize {
        self.blocked.load(Ordering::Acquire)
    }
}
