// Net Automount - Debounce Primitive
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Trailing-edge debouncer for event streams.
//!
//! Every pushed value restarts the quiescence window; only the latest value
//! is delivered once the window elapses without another push. Used inside a
//! `tokio::select!` loop next to the receiving channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         event = rx.recv() => match event {
//!             Some(value) => debouncer.push(value),
//!             None => break,
//!         },
//!         Some(value) = debouncer.settled() => handle(value),
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Holds the most recent value until the stream goes quiet.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Debouncer<T> {
    /// Create a debouncer with the given quiescence window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            deadline: None,
        }
    }

    /// Record a new value, replacing any pending one and restarting the window.
    pub fn push(&mut self, value: T) {
        self.pending = Some(value);
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Whether a value is waiting for the window to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolve with the pending value once the window has elapsed.
    ///
    /// Never resolves while nothing is pending. Cancel-safe: dropping the
    /// future before it completes leaves the pending value in place.
    pub async fn settled(&mut self) -> Option<T> {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
                self.pending.take()
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    /// Drive a debouncer from a channel and collect everything it delivers.
    async fn collect(mut rx: mpsc::Receiver<u32>, window: Duration) -> Vec<u32> {
        let mut debouncer = Debouncer::new(window);
        let mut out = Vec::new();
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(value) => debouncer.push(value),
                    None => break,
                },
                Some(value) = debouncer.settled() => out.push(value),
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_last_value() {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(collect(rx, Duration::from_millis(500)));

        for value in [1, 2, 1] {
            tx.send(value).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(tx);

        assert_eq!(handle.await.unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_values_all_delivered() {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(collect(rx, Duration::from_millis(500)));

        tx.send(1).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(2).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(tx);

        assert_eq!(handle.await.unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_push_restarts_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        debouncer.push("a");
        tokio::time::sleep(Duration::from_millis(400)).await;
        debouncer.push("b");

        let start = Instant::now();
        assert_eq!(debouncer.settled().await, Some("b"));
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(!debouncer.is_pending());
    }
}
