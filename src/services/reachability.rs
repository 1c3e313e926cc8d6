// Net Automount - Reachability Probe
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! TCP-level reachability probe.
//!
//! Opens a single connection to `host:port` and reports exactly one
//! outcome. No internal retries; retry policy belongs to the orchestrator.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of one reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A TCP connection was established.
    Reachable,
    /// The connection attempt failed (refused, no route, DNS failure, ...).
    Unreachable(String),
    /// No answer within the timeout.
    TimedOut,
    /// The caller cancelled the probe.
    Cancelled,
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => f.write_str("reachable"),
            Self::Unreachable(reason) => write!(f, "unreachable ({})", reason),
            Self::TimedOut => f.write_str("timed out"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Transport-level liveness check for a server.
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn probe(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProbeOutcome;
}

/// Probe backed by a plain `TcpStream::connect`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

#[async_trait]
impl Reachability for TcpProbe {
    async fn probe(
        &self,
        host: &str,
        port: u16,
        limit: Duration,
        cancel: &CancellationToken,
    ) -> ProbeOutcome {
        // select! polls one branch to completion; the losers are dropped,
        // so only one outcome is ever produced.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => ProbeOutcome::Cancelled,
            result = timeout(limit, TcpStream::connect((host, port))) => match result {
                Ok(Ok(_stream)) => ProbeOutcome::Reachable,
                Ok(Err(e)) => ProbeOutcome::Unreachable(e.to_string()),
                Err(_) => ProbeOutcome::TimedOut,
            },
        };
        debug!("Probe {}:{} -> {}", host, port, outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_local_listener_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = TcpProbe
            .probe("127.0.0.1", port, Duration::from_secs(2), &CancellationToken::new())
            .await;
        assert_eq!(outcome, ProbeOutcome::Reachable);
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let outcome = TcpProbe
            .probe("127.0.0.1", port, Duration::from_secs(2), &CancellationToken::new())
            .await;
        assert!(matches!(outcome, ProbeOutcome::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();

        let outcome = TcpProbe
            .probe("127.0.0.1", 9, Duration::from_secs(2), &token)
            .await;
        assert_eq!(outcome, ProbeOutcome::Cancelled);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ProbeOutcome::TimedOut.to_string(), "timed out");
        assert!(ProbeOutcome::Reachable.is_reachable());
        assert!(!ProbeOutcome::Cancelled.is_reachable());
    }
}
