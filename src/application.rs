// Net Automount - Application
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Application root object and lifecycle wiring.
//!
//! Builds the runtime, wires the stores and services together and executes
//! one command-line [`Command`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::dbus_client::NmClient;
use crate::models::{AppConfig, AutoMountRule, Error, MountTarget, NetworkFingerprint, NetworkProtocol, Result};
use crate::services::{
    AutoMountService, MountManager, NetworkIntrospector, NetworkMonitor, PollingIntrospector,
    Reachability, RetryPolicy, SecretStore, SystemMounter, TcpProbe, VaultSecretStore,
};
use crate::storage::{DataStore, TargetStore};

/// How long one-shot commands wait for a network sample.
const SAMPLE_LIMIT: Duration = Duration::from_secs(3);

/// Build the Tokio runtime used for all async work.
pub fn tokio_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| Error::System(format!("Failed to create Tokio runtime: {}", e)))
}

/// A parsed command-line command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the auto-mount daemon.
    Run,
    List,
    Status,
    Add {
        alias: String,
        protocol: NetworkProtocol,
        host: String,
        share: String,
        user: Option<String>,
    },
    Remove { alias: String },
    SetPassword { alias: String },
    RememberNetwork { alias: String },
    Test { alias: String },
    Mount { alias: String },
    Unmount { alias: String },
}

impl Command {
    /// Parse the positional arguments that follow the options.
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Self::Run);
        };

        let alias = |rest: &[String]| -> Result<String> {
            match rest {
                [alias] => Ok(alias.clone()),
                _ => Err(Error::ValidationFailed(format!("Usage: {} <alias>", name))),
            }
        };

        match name.as_str() {
            "run" if rest.is_empty() => Ok(Self::Run),
            "list" if rest.is_empty() => Ok(Self::List),
            "status" if rest.is_empty() => Ok(Self::Status),
            "add" => match rest {
                [alias, protocol, host, share, user @ ..] if user.len() <= 1 => {
                    let protocol = NetworkProtocol::parse(protocol).ok_or_else(|| {
                        Error::ValidationFailed(format!("Unknown protocol '{}' (expected smb, nfs or ftp)", protocol))
                    })?;
                    Ok(Self::Add {
                        alias: alias.clone(),
                        protocol,
                        host: host.clone(),
                        share: share.clone(),
                        user: user.first().cloned(),
                    })
                }
                _ => Err(Error::ValidationFailed(
                    "Usage: add <alias> <smb|nfs|ftp> <host> <share> [user]".into(),
                )),
            },
            "remove" => Ok(Self::Remove { alias: alias(rest)? }),
            "set-password" => Ok(Self::SetPassword { alias: alias(rest)? }),
            "remember-network" => Ok(Self::RememberNetwork { alias: alias(rest)? }),
            "test" => Ok(Self::Test { alias: alias(rest)? }),
            "mount" => Ok(Self::Mount { alias: alias(rest)? }),
            "unmount" => Ok(Self::Unmount { alias: alias(rest)? }),
            _ => Err(Error::ValidationFailed(format!("Unknown command: {}", args.join(" ")))),
        }
    }
}

/// Application state shared by all commands.
pub struct Application {
    store: Arc<DataStore>,
    config: AppConfig,
    secrets: Arc<VaultSecretStore>,
    mounts: Arc<MountManager>,
}

impl Application {
    /// Open the stores and build the mount stack.
    pub fn new(config_dir: Option<PathBuf>) -> Result<Self> {
        let store = Arc::new(match config_dir {
            Some(dir) => DataStore::with_config_dir(dir),
            None => DataStore::new(),
        });
        let config = store.settings();
        let secrets = Arc::new(VaultSecretStore::open(store.config_dir())?);

        let primitive = Arc::new(SystemMounter::new(
            config.mount_root(),
            config.mount_timeout(),
            config.unmount_timeout(),
        ));
        let mounts = Arc::new(MountManager::new(
            primitive,
            secrets.clone(),
            config.liveness_timeout(),
        ));

        Ok(Self {
            store,
            config,
            secrets,
            mounts,
        })
    }

    /// Execute a command to completion on a fresh runtime.
    pub fn run(self, command: Command) -> Result<()> {
        let runtime = tokio_runtime()?;
        runtime.block_on(self.execute(command))
    }

    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Run => self.run_daemon().await,
            Command::List => self.list(),
            Command::Status => self.status().await,
            Command::Add {
                alias,
                protocol,
                host,
                share,
                user,
            } => self.add(alias, protocol, host, share, user),
            Command::Remove { alias } => self.remove(&alias),
            Command::SetPassword { alias } => self.set_password(&alias),
            Command::RememberNetwork { alias } => self.remember_network(&alias).await,
            Command::Test { alias } => self.test(&alias).await,
            Command::Mount { alias } => {
                let target = self.store.find_target(&alias)?;
                let path = self.mounts.mount(&target).await?;
                println!("{} mounted at {}", target.alias, path.display());
                Ok(())
            }
            Command::Unmount { alias } => {
                let target = self.store.find_target(&alias)?;
                if self.mounts.unmount(&target).await? {
                    println!("{} unmounted", target.alias);
                } else {
                    println!("{} is not mounted", target.alias);
                }
                Ok(())
            }
        }
    }

    /// Pick the network introspector: NetworkManager when it answers on the
    /// system bus, the polling sampler otherwise.
    async fn introspector(&self) -> Arc<dyn NetworkIntrospector> {
        match NmClient::connect().await {
            Ok(client) => match client.state().await {
                Ok(_) => return Arc::new(client),
                Err(e) => warn!("NetworkManager not available on the system bus: {}", e),
            },
            Err(e) if e.is_bus_unavailable() => warn!("System bus not available: {}", e),
            Err(e) => warn!("Failed to reach NetworkManager: {}", e),
        }
        info!(
            "Falling back to route polling every {:?}",
            self.config.poll_interval()
        );
        Arc::new(PollingIntrospector::new(self.config.poll_interval()))
    }

    async fn current_network(&self) -> Result<Option<NetworkFingerprint>> {
        let monitor = NetworkMonitor::new(self.introspector().await, self.config.network_settle());
        monitor.sample_once(SAMPLE_LIMIT).await
    }

    // ========================================================================
    // Daemon
    // ========================================================================

    async fn run_daemon(&self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let targets: Arc<dyn TargetStore> = self.store.clone();
        let count = targets.load_targets()?.len();
        info!(
            "Starting auto-mount daemon with {} target(s), mounting under {}",
            count,
            self.config.mount_root().display()
        );
        if !self.config.auto_mount_enabled {
            warn!("Auto-mount is disabled in settings; network changes will only cancel attempts");
        }

        let monitor = NetworkMonitor::new(self.introspector().await, self.config.network_settle());
        let service = AutoMountService::new(
            targets,
            Arc::new(TcpProbe),
            self.mounts.clone(),
            RetryPolicy::from_config(&self.config),
        )
        .with_debounce(self.config.evaluation_debounce())
        .with_enabled(self.config.auto_mount_enabled);

        let (tx, rx) = mpsc::channel(16);
        let monitor_task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { monitor.run(tx, shutdown).await }
        });
        tokio::spawn(wait_for_signal(shutdown.clone()));

        service.run(rx, shutdown.clone()).await;
        shutdown.cancel();
        service.shutdown().await;

        match monitor_task.await {
            Ok(result) => result,
            Err(e) => Err(Error::Internal(format!("Network monitor task failed: {}", e))),
        }
    }

    // ========================================================================
    // One-shot commands
    // ========================================================================

    fn list(&self) -> Result<()> {
        let targets = self.store.load_targets()?;
        if targets.is_empty() {
            println!("No mount targets configured");
            return Ok(());
        }
        for target in &targets {
            println!("{}", describe_target(target));
            for rule in &target.rules {
                let state = if rule.enabled { "" } else { " (disabled)" };
                println!("    on {}{}", rule.fingerprint.description(), state);
            }
        }
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        let targets = self.store.load_targets()?;
        let network = self.current_network().await?;
        match &network {
            Some(fingerprint) => println!("Network: {}", fingerprint.description()),
            None => println!("Network: none"),
        }

        for target in &targets {
            let record = match self.mounts.status(target).await {
                Ok(record) => record,
                Err(e) => {
                    error!("Failed to inspect {}: {}", target.alias, e);
                    continue;
                }
            };
            let location = record
                .mount_path
                .as_ref()
                .map(|p| format!(" at {}", p.display()))
                .unwrap_or_default();
            let matched = network
                .as_ref()
                .map(|fp| target.matches_network(fp))
                .unwrap_or(false);
            println!(
                "{:<16} {}{}{}",
                target.alias,
                record.liveness.as_str(),
                location,
                if matched { "  [matches current network]" } else { "" }
            );
        }
        Ok(())
    }

    fn add(
        &self,
        alias: String,
        protocol: NetworkProtocol,
        host: String,
        share: String,
        user: Option<String>,
    ) -> Result<()> {
        let mut target = MountTarget::new(alias, protocol, host, share);
        target.username = user;
        let description = describe_target(&target);
        self.store.add_target(target)?;
        println!("Added {}", description);
        Ok(())
    }

    fn remove(&self, alias: &str) -> Result<()> {
        let target = self.store.find_target(alias)?;
        let removed = self.store.remove_target(target.id)?;
        if let Some(reference) = &removed.secret_ref {
            self.secrets.delete(reference);
        }
        println!("Removed {}", removed.alias);
        Ok(())
    }

    fn set_password(&self, alias: &str) -> Result<()> {
        let mut target = self.store.find_target(alias)?;
        if target.username.is_none() {
            warn!("{} has no user name; the password is only used for authenticated mounts", target.alias);
        }

        let password = Zeroizing::new(rpassword::prompt_password(format!("Password for {}: ", target.alias))?);
        let reference = target
            .secret_ref
            .clone()
            .unwrap_or_else(|| target.id.to_string());
        let stored = self.secrets.save(&password, &reference)?;

        target.secret_ref = Some(stored);
        self.store.update_target(target)?;
        println!("Password stored");
        Ok(())
    }

    async fn remember_network(&self, alias: &str) -> Result<()> {
        let mut target = self.store.find_target(alias)?;
        let fingerprint = self
            .current_network()
            .await?
            .ok_or_else(|| Error::ValidationFailed("No active network".into()))?;
        if !fingerprint.is_matchable() {
            return Err(Error::ValidationFailed(format!(
                "The current {} cannot be told apart from other networks",
                fingerprint.description()
            )));
        }

        if target.rules.iter().any(|rule| rule.fingerprint == fingerprint) {
            println!("{} already mounts on {}", target.alias, fingerprint.description());
            return Ok(());
        }

        println!("{} will mount on {}", target.alias, fingerprint.description());
        target.rules.push(AutoMountRule::new(fingerprint));
        self.store.update_target(target)
    }

    async fn test(&self, alias: &str) -> Result<()> {
        let target = self.store.find_target(alias)?;
        let port = target.probe_port();
        let outcome = TcpProbe
            .probe(
                &target.hostname,
                port,
                self.config.probe_timeout(),
                &CancellationToken::new(),
            )
            .await;
        println!("{}:{} {}", target.hostname, port, outcome);
        if outcome.is_reachable() {
            Ok(())
        } else {
            Err(Error::Unreachable(format!("{}:{} {}", target.hostname, port, outcome)))
        }
    }
}

/// One-line summary of a target.
fn describe_target(target: &MountTarget) -> String {
    let rules = target.rules.iter().filter(|r| r.enabled).count();
    let location = target
        .access_url()
        .map(|url| url.to_string())
        .unwrap_or_else(|_| format!("{}://{} (invalid)", target.protocol.scheme(), target.hostname));
    format!(
        "{:<16} {} ({} rule{})",
        target.alias,
        location,
        rules,
        if rules == 1 { "" } else { "s" }
    )
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
                    _ = terminate.recv() => info!("Terminated, shutting down"),
                    _ = shutdown.cancelled() => return,
                }
                shutdown.cancel();
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            info!("Interrupted, shutting down");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_defaults_to_daemon() {
        assert_eq!(Command::parse(&[]).unwrap(), Command::Run);
        assert_eq!(Command::parse(&args("run")).unwrap(), Command::Run);
        assert_eq!(Command::parse(&args("status")).unwrap(), Command::Status);
    }

    #[test]
    fn test_parse_add() {
        assert_eq!(
            Command::parse(&args("add Media smb nas.local media alice")).unwrap(),
            Command::Add {
                alias: "Media".into(),
                protocol: NetworkProtocol::Smb,
                host: "nas.local".into(),
                share: "media".into(),
                user: Some("alice".into()),
            }
        );
        assert!(matches!(
            Command::parse(&args("add Media nfs nas.local /export")).unwrap(),
            Command::Add { user: None, protocol: NetworkProtocol::Nfs, .. }
        ));
        assert!(Command::parse(&args("add Media webdav nas.local media")).is_err());
        assert!(Command::parse(&args("add Media smb")).is_err());
    }

    #[test]
    fn test_parse_alias_commands() {
        assert_eq!(
            Command::parse(&args("remember-network Media")).unwrap(),
            Command::RememberNetwork { alias: "Media".into() }
        );
        assert_eq!(
            Command::parse(&args("unmount Media")).unwrap(),
            Command::Unmount { alias: "Media".into() }
        );
        assert!(Command::parse(&args("mount")).is_err());
        assert!(Command::parse(&args("mount a b")).is_err());
        assert!(Command::parse(&args("frobnicate")).is_err());
    }

    #[test]
    fn test_describe_target_counts_enabled_rules() {
        let mut target = MountTarget::new("Media", NetworkProtocol::Smb, "nas.local", "media");
        target.rules.push(AutoMountRule::new(NetworkFingerprint::wifi("Home")));
        let mut disabled = AutoMountRule::new(NetworkFingerprint::wifi("Office"));
        disabled.enabled = false;
        target.rules.push(disabled);

        let line = describe_target(&target);
        assert!(line.starts_with("Media"));
        assert!(line.contains("smb://nas.local/media"));
        assert!(line.ends_with("(1 rule)"));

        let bad = MountTarget::new("Bad", NetworkProtocol::Smb, "nas local", "media");
        assert!(describe_target(&bad).contains("smb://nas local (invalid)"));
    }
}
