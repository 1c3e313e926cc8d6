// Net Automount - Network Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Network interface detection and utilities.
//!
//! Helpers shared by the network introspectors: default-route lookup via
//! `ip route`, gateway MAC resolution via `ip neigh`, Wi-Fi details via
//! `nmcli` terse output and interface classification via sysfs.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::validation::validate_mac_address;
use crate::models::InterfaceType;
use crate::services::network_monitor::{PathStatus, PathUpdate, WifiDetails};

/// Root of the kernel's network interface tree.
const SYS_CLASS_NET: &str = "/sys/class/net";

/// `nmcli` query for the active access point. Never triggers a rescan.
const NMCLI_WIFI_ARGS: &[&str] = &[
    "-t", "-f", "active,ssid,bssid", "dev", "wifi", "list", "--rescan", "no",
];

/// Longest a helper command may run before it is killed.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// The default route as reported by `ip route show default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRoute {
    pub gateway: Option<String>,
    pub device: Option<String>,
}

// ============================================================================
// Command helpers
// ============================================================================

/// Run a command and return its stdout if it exited successfully.
async fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    command_stdout_within(program, args, COMMAND_TIMEOUT).await
}

async fn command_stdout_within(program: &str, args: &[&str], limit: Duration) -> Option<String> {
    let output = Command::new(program).args(args).kill_on_drop(true).output();
    match timeout(limit, output).await {
        Ok(Ok(output)) if output.status.success() => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
        Ok(Ok(output)) => {
            debug!(
                "{} {:?} exited with {}: {}",
                program,
                args,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            None
        }
        Ok(Err(e)) => {
            debug!("Failed to run {}: {}", program, e);
            None
        }
        Err(_) => {
            warn!("{} {:?} did not finish within {:?}", program, args, limit);
            None
        }
    }
}

/// Current default route.
pub async fn default_route() -> Option<DefaultRoute> {
    let stdout = command_stdout("ip", &["route", "show", "default"]).await?;
    parse_default_route(&stdout)
}

/// Hardware address of the default gateway, lower-cased.
pub async fn gateway_mac() -> Option<String> {
    let gateway = default_route().await?.gateway?;
    let stdout = command_stdout("ip", &["neigh", "show", &gateway]).await?;
    parse_neighbor_mac(&stdout)
}

/// SSID and BSSID of the active Wi-Fi connection, from NetworkManager's
/// cached scan results.
pub async fn active_wifi() -> Option<WifiDetails> {
    let stdout = command_stdout("nmcli", NMCLI_WIFI_ARGS).await?;
    parse_active_wifi(&stdout)
}

/// Sample the network path from the routing table and sysfs.
pub async fn sample_path() -> PathUpdate {
    match default_route().await.and_then(|route| route.device) {
        Some(device) => PathUpdate {
            status: PathStatus::Satisfied,
            interface: interface_type(Path::new(SYS_CLASS_NET), &device),
        },
        None => PathUpdate::unsatisfied(),
    }
}

// ============================================================================
// Parsers
// ============================================================================

/// Parse `ip route show default`.
///
/// Example: `default via 192.168.1.1 dev wlp2s0 proto dhcp metric 600`
pub fn parse_default_route(stdout: &str) -> Option<DefaultRoute> {
    let line = stdout.lines().find(|line| line.trim_start().starts_with("default"))?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let after = |key: &str| {
        tokens
            .iter()
            .position(|t| *t == key)
            .and_then(|i| tokens.get(i + 1))
            .map(|s| s.to_string())
    };
    Some(DefaultRoute {
        gateway: after("via"),
        device: after("dev"),
    })
}

/// Parse `ip neigh show <gateway>`.
///
/// Example: `192.168.1.1 dev wlp2s0 lladdr AA:BB:CC:DD:EE:FF REACHABLE`
pub fn parse_neighbor_mac(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        tokens.find(|t| *t == "lladdr")?;
        validate_mac_address(tokens.next()?).ok()
    })
}

/// Split one line of `nmcli -t` output into fields.
///
/// Fields are separated by `:`; literal colons and backslashes inside a
/// field are escaped as `\:` and `\\`.
pub fn split_terse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Pick the active network from `nmcli -t -f active,ssid,bssid dev wifi list`.
pub fn parse_active_wifi(stdout: &str) -> Option<WifiDetails> {
    stdout.lines().find_map(|line| {
        let fields = split_terse_fields(line);
        if fields.first().map(String::as_str) != Some("yes") {
            return None;
        }
        let ssid = fields.get(1).filter(|s| !s.is_empty())?.clone();
        let bssid = fields
            .get(2)
            .and_then(|b| validate_mac_address(b).ok());
        Some(WifiDetails { ssid, bssid })
    })
}

// ============================================================================
// sysfs
// ============================================================================

/// Classify an interface from its sysfs entry under `sys_root`.
pub fn interface_type(sys_root: &Path, name: &str) -> InterfaceType {
    let path = sys_root.join(name);

    // Check for wireless by looking for wireless directory
    if path.join("wireless").exists() {
        return InterfaceType::Wifi;
    }
    if let Ok(uevent) = fs::read_to_string(path.join("uevent")) {
        if uevent.contains("DEVTYPE=wlan") {
            return InterfaceType::Wifi;
        }
    }

    // Check type file (1 = ARPHRD_ETHER)
    if let Ok(type_str) = fs::read_to_string(path.join("type")) {
        if type_str.trim() == "1" && !is_virtual_interface(name) {
            return InterfaceType::Wired;
        }
    }

    if name.starts_with("wl") {
        InterfaceType::Wifi
    } else if name.starts_with("en") || name.starts_with("eth") {
        InterfaceType::Wired
    } else {
        InterfaceType::Other
    }
}

/// Check if interface name suggests a virtual/tunnel interface.
fn is_virtual_interface(name: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "veth", "br", "virbr", "docker", "vnet", "tun", "tap", "bond", "team", "vlan", "wg",
    ];
    PREFIXES.iter().any(|p| name.starts_with(p)) || name.contains("podman")
}
