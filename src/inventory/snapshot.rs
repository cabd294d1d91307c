// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Inventory served from a JSON snapshot

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

use super::{Inventory, InventoryError, SwitchRecord, UserIp, WiringEntry};

/// Address table row: an IP and the wiring identifier it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub ip: Ipv4Addr,
    pub dvo: String,
}

/// Whole inventory as exported from the inventory database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub switches: Vec<SwitchRecord>,
    #[serde(default)]
    pub wiring: Vec<WiringEntry>,
    #[serde(default)]
    pub addresses: Vec<AddressEntry>,
}

#[derive(Debug, Clone)]
pub struct SnapshotInventory {
    snapshot: InventorySnapshot,
}

impl SnapshotInventory {
    #[must_use]
    pub fn new(mut snapshot: InventorySnapshot) -> Self {
        snapshot.switches.sort_by(|a, b| {
            a.dorm
                .cmp(&b.dorm)
                .then(b.level.cmp(&a.level))
                .then(a.ip.cmp(&b.ip))
        });
        snapshot
            .wiring
            .sort_by(|a, b| a.switch_ip.cmp(&b.switch_ip).then(a.port.cmp(&b.port)));
        Self { snapshot }
    }

    /// Reads the snapshot file at startup
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InventoryError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let snapshot: InventorySnapshot = serde_json::from_str(&raw)?;
        tracing::info!(
            "Loaded inventory: {} switches, {} wiring entries, {} addresses",
            snapshot.switches.len(),
            snapshot.wiring.len(),
            snapshot.addresses.len()
        );
        Ok(Self::new(snapshot))
    }

    fn address_of(&self, dvo: &str) -> Option<Ipv4Addr> {
        self.snapshot
            .addresses
            .iter()
            .find(|entry| entry.dvo == dvo)
            .map(|entry| entry.ip)
    }
}

#[async_trait]
impl Inventory for SnapshotInventory {
    async fn list_switches(&self) -> Result<Vec<SwitchRecord>, InventoryError> {
        Ok(self.snapshot.switches.clone())
    }

    async fn list_ports(&self, switch: Ipv4Addr) -> Result<Vec<WiringEntry>, InventoryError> {
        Ok(self
            .snapshot
            .wiring
            .iter()
            .filter(|entry| entry.switch_ip == switch)
            .cloned()
            .collect())
    }

    async fn find_user_ip(&self, switch: Ipv4Addr, port: u32) -> Result<UserIp, InventoryError> {
        let not_found = || InventoryError::UserIpNotFound { switch, port };
        let wiring = self
            .snapshot
            .wiring
            .iter()
            .find(|entry| entry.switch_ip == switch && entry.port == port)
            .ok_or_else(not_found)?;

        let ip = self.address_of(&wiring.dvo()).ok_or_else(not_found)?;
        let gateway = self
            .address_of(&format!("{}-gateway", wiring.dorm))
            .ok_or_else(not_found)?;
        Ok(UserIp { ip, gateway })
    }
}
