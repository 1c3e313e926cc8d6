// Net Automount - Network Fingerprints
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Network fingerprints and the rule matcher.
//!
//! A fingerprint is a normalized snapshot of the current network attachment.
//! Rules store a fingerprint captured earlier; the matcher decides whether
//! the rule applies to the network the host is attached to now.
//!
//! ## Matching
//!
//! 1. If both sides carry an SSID, the SSIDs decide.
//! 2. Otherwise, if both sides carry a gateway MAC, the MACs decide.
//! 3. Otherwise there is nothing comparable and the rule does not match.
//!
//! The BSSID is recorded for diagnostics only; access points of one network
//! roam between BSSIDs and matching on it would flap.

use serde::{Deserialize, Serialize};

/// Type of the interface carrying the active route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    /// Wireless (Wi-Fi) interface.
    Wifi,
    /// Wired Ethernet interface.
    Wired,
    /// Anything else (VPN, cellular, bridges, ...).
    #[default]
    Other,
}

impl InterfaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Wired => "wired",
            Self::Other => "other",
        }
    }

    /// Map a NetworkManager connection type string to an interface type.
    pub fn from_nm_connection_type(kind: &str) -> Self {
        match kind {
            "802-11-wireless" | "wifi" => Self::Wifi,
            "802-3-ethernet" | "ethernet" => Self::Wired,
            _ => Self::Other,
        }
    }
}

/// Normalized snapshot of the current network attachment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NetworkFingerprint {
    /// Wi-Fi network name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    /// Access point hardware address (not used for matching).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bssid: Option<String>,
    /// Hardware address of the default gateway (lower-case).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_mac: Option<String>,
    /// Interface carrying the default route.
    #[serde(default)]
    pub interface_type: InterfaceType,
}

impl NetworkFingerprint {
    /// Create a Wi-Fi fingerprint for the given SSID.
    pub fn wifi(ssid: impl Into<String>) -> Self {
        Self {
            ssid: Some(ssid.into()),
            interface_type: InterfaceType::Wifi,
            ..Self::default()
        }
    }

    /// Create a wired fingerprint identified by its gateway MAC.
    pub fn wired(gateway_mac: impl Into<String>) -> Self {
        Self {
            gateway_mac: Some(gateway_mac.into().to_lowercase()),
            interface_type: InterfaceType::Wired,
            ..Self::default()
        }
    }

    /// Check whether this (stored) fingerprint matches an observed one.
    pub fn matches(&self, other: &NetworkFingerprint) -> bool {
        if let (Some(mine), Some(theirs)) = (&self.ssid, &other.ssid) {
            return mine == theirs;
        }
        if let (Some(mine), Some(theirs)) = (&self.gateway_mac, &other.gateway_mac) {
            return mine.eq_ignore_ascii_case(theirs);
        }
        false
    }

    /// Check whether the fingerprint carries any field the matcher can compare.
    pub fn is_matchable(&self) -> bool {
        self.ssid.is_some() || self.gateway_mac.is_some()
    }

    /// Get a human-readable description.
    pub fn description(&self) -> String {
        match (&self.ssid, &self.gateway_mac) {
            (Some(ssid), _) => format!("Wi-Fi \"{}\"", ssid),
            (None, Some(mac)) => format!("{} network (gateway {})", self.interface_type.as_str(), mac),
            (None, None) => format!("unidentified {} network", self.interface_type.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(ssid: Option<&str>, gateway: Option<&str>) -> NetworkFingerprint {
        NetworkFingerprint {
            ssid: ssid.map(str::to_string),
            bssid: None,
            gateway_mac: gateway.map(str::to_string),
            interface_type: InterfaceType::Other,
        }
    }

    #[test]
    fn test_ssid_takes_priority_over_gateway() {
        let rule = fingerprint(Some("A"), Some("aa:bb"));
        let observed = fingerprint(Some("B"), Some("aa:bb"));
        assert!(!rule.matches(&observed));
    }

    #[test]
    fn test_gateway_fallback_without_ssid() {
        let rule = fingerprint(None, Some("aa:bb"));
        let observed = fingerprint(None, Some("aa:bb"));
        assert!(rule.matches(&observed));
    }

    #[test]
    fn test_gateway_fallback_when_one_side_lacks_ssid() {
        let rule = fingerprint(Some("Home"), Some("aa:bb"));
        let observed = fingerprint(None, Some("AA:BB"));
        assert!(rule.matches(&observed));
    }

    #[test]
    fn test_nothing_comparable() {
        let rule = fingerprint(Some("Home"), None);
        let observed = fingerprint(None, Some("aa:bb"));
        assert!(!rule.matches(&observed));
        assert!(!fingerprint(None, None).matches(&fingerprint(None, None)));
    }

    #[test]
    fn test_bssid_ignored() {
        let mut rule = NetworkFingerprint::wifi("Office");
        rule.bssid = Some("11:11:11:11:11:11".into());
        let mut observed = NetworkFingerprint::wifi("Office");
        observed.bssid = Some("22:22:22:22:22:22".into());
        assert!(rule.matches(&observed));
    }

    #[test]
    fn test_matches_is_stable() {
        let rule = NetworkFingerprint::wifi("Office");
        let observed = NetworkFingerprint::wifi("Office");
        let first = rule.matches(&observed);
        for _ in 0..10 {
            assert_eq!(rule.matches(&observed), first);
        }
    }

    #[test]
    fn test_interface_type_from_nm() {
        assert_eq!(InterfaceType::from_nm_connection_type("802-11-wireless"), InterfaceType::Wifi);
        assert_eq!(InterfaceType::from_nm_connection_type("802-3-ethernet"), InterfaceType::Wired);
        assert_eq!(InterfaceType::from_nm_connection_type("vpn"), InterfaceType::Other);
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&NetworkFingerprint::wifi("Home")).unwrap();
        assert_eq!(json, r#"{"ssid":"Home","interface_type":"wifi"}"#);
    }
}
