// Net Automount - NetworkManager D-Bus Client
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Async D-Bus client for NetworkManager.
//!
//! Follows `org.freedesktop.NetworkManager` on the system bus and turns its
//! state signals into [`PathUpdate`]s for the network monitor.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zbus::zvariant::OwnedValue;
use zbus::{Connection, Proxy};

use crate::models::{Error, InterfaceType, Result};
use crate::network_utils;
use crate::services::network_monitor::{NetworkIntrospector, PathUpdate, WifiDetails};

/// Well-known bus name of NetworkManager.
pub const NM_BUS_NAME: &str = "org.freedesktop.NetworkManager";
/// Object path of the NetworkManager root object.
pub const NM_OBJECT_PATH: &str = "/org/freedesktop/NetworkManager";
/// Main NetworkManager interface.
pub const NM_INTERFACE: &str = "org.freedesktop.NetworkManager";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// `NM_STATE_CONNECTED_LOCAL`; anything at or above has a usable route.
pub const NM_STATE_CONNECTED_LOCAL: u32 = 50;

/// D-Bus client for NetworkManager.
#[derive(Clone)]
pub struct NmClient {
    connection: Connection,
}

impl NmClient {
    /// Connect to the system bus.
    pub async fn connect() -> Result<Self> {
        match Connection::system().await {
            Ok(connection) => {
                debug!("Connected to system D-Bus");
                Ok(Self { connection })
            }
            Err(e) => {
                error!("Failed to connect to system D-Bus: {}", e);
                Err(Error::DbusConnectionFailed(e.to_string()))
            }
        }
    }

    /// Read a property of the NetworkManager root object.
    async fn property(&self, name: &str) -> Result<OwnedValue> {
        let reply = self
            .connection
            .call_method(
                Some(NM_BUS_NAME),
                NM_OBJECT_PATH,
                Some(PROPERTIES_INTERFACE),
                "Get",
                &(NM_INTERFACE, name),
            )
            .await?;
        Ok(reply.body().deserialize::<OwnedValue>()?)
    }

    /// Global connectivity state (`NMState`).
    pub async fn state(&self) -> Result<u32> {
        let value = self.property("State").await?;
        u32::try_from(value).map_err(|e| Error::Dbus(format!("State: {}", e)))
    }

    /// Connection type of the primary connection (e.g. `802-11-wireless`).
    pub async fn primary_connection_type(&self) -> Result<String> {
        let value = self.property("PrimaryConnectionType").await?;
        String::try_from(value).map_err(|e| Error::Dbus(format!("PrimaryConnectionType: {}", e)))
    }

    /// Sample the current network path.
    pub async fn sample(&self) -> PathUpdate {
        match self.state().await {
            Ok(state) if state >= NM_STATE_CONNECTED_LOCAL => {
                let kind = self.primary_connection_type().await.unwrap_or_else(|e| {
                    warn!("Failed to read primary connection type: {}", e);
                    String::new()
                });
                PathUpdate::satisfied(InterfaceType::from_nm_connection_type(&kind))
            }
            Ok(state) => {
                debug!("NetworkManager state {}: no usable route", state);
                PathUpdate::unsatisfied()
            }
            Err(e) => {
                warn!("Failed to read NetworkManager state: {}", e);
                PathUpdate::unsatisfied()
            }
        }
    }
}

#[async_trait]
impl NetworkIntrospector for NmClient {
    async fn path_updates(&self) -> Result<mpsc::Receiver<PathUpdate>> {
        let nm = Proxy::new(&self.connection, NM_BUS_NAME, NM_OBJECT_PATH, NM_INTERFACE).await?;
        let properties =
            Proxy::new(&self.connection, NM_BUS_NAME, NM_OBJECT_PATH, PROPERTIES_INTERFACE).await?;

        let state_changed = nm.receive_signal("StateChanged").await?;
        let properties_changed = properties.receive_signal("PropertiesChanged").await?;
        let mut signals = Box::pin(futures::stream::select(
            state_changed.map(|_| ()),
            properties_changed.map(|_| ()),
        ));

        let (tx, rx) = mpsc::channel(16);
        let client = self.clone();
        tokio::spawn(async move {
            // Keep the proxies alive for as long as their streams are polled.
            let _proxies = (nm, properties);

            if tx.send(client.sample().await).await.is_err() {
                return;
            }
            while signals.next().await.is_some() {
                if tx.send(client.sample().await).await.is_err() {
                    return;
                }
            }
            warn!("NetworkManager signal stream ended");
        });

        info!("Following NetworkManager state on the system bus");
        Ok(rx)
    }

    async fn wifi_details(&self) -> Option<WifiDetails> {
        network_utils::active_wifi().await
    }

    async fn gateway_mac(&self) -> Option<String> {
        network_utils::gateway_mac().await
    }
}
