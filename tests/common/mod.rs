// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Shared fixtures: a dorm with one backbone and one edge switch, and a
//! probe answering from a scripted forwarding table

#![allow(dead_code)]

use async_trait::async_trait;
use dormnet_dhcp::addr::MacAddr;
use dormnet_dhcp::inventory::{InventorySnapshot, SnapshotInventory};
use dormnet_dhcp::snmp::{AdminStatus, BridgePort, SnmpError, SwitchProbe, Vlan};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Mutex;

pub const BACKBONE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const EDGE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
pub const CLIENT_MAC: MacAddr = MacAddr::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
pub const EDGE_MAC: MacAddr = MacAddr::new([0, 0, 0, 0, 0, 5]);

pub fn inventory() -> SnapshotInventory {
    let snapshot: InventorySnapshot = serde_json::from_value(serde_json::json!({
        "switches": [
            {"ip": "10.0.0.1", "mac": "000000000001", "name": "GS2200-24", "dorm": "A",
             "subnet": "10.1.0.0/24", "level": 0, "community": "pub"},
            {"ip": "10.0.0.5", "mac": "000000000005", "name": "GS2200-24", "dorm": "A",
             "subnet": "10.1.0.0/24", "level": -1, "community": "pub", "uplink": 25}
        ],
        "wiring": [
            {"switch_ip": "10.0.0.5", "port": 7, "dorm": "A", "room": "101", "plug": "2"}
        ],
        "addresses": [
            {"ip": "10.1.2.10", "dvo": "A101-2"},
            {"ip": "10.1.0.1", "dvo": "A-gateway"}
        ]
    }))
    .unwrap();
    SnapshotInventory::new(snapshot)
}

/// Probe answering MAC lookups from a fixed table
#[derive(Default)]
pub struct ScriptedProbe {
    fdb: Mutex<HashMap<(Ipv4Addr, MacAddr), u32>>,
    bridge_ports: Mutex<HashMap<Ipv4Addr, Vec<BridgePort>>>,
    unreachable: Mutex<HashSet<Ipv4Addr>>,
    admin: Mutex<HashMap<(Ipv4Addr, u32), AdminStatus>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learn(&self, switch: Ipv4Addr, mac: MacAddr, port: u32) {
        self.fdb.lock().unwrap().insert((switch, mac), port);
    }

    pub fn bridge_ports(&self, switch: Ipv4Addr, ports: Vec<BridgePort>) {
        self.bridge_ports.lock().unwrap().insert(switch, ports);
    }

    pub fn unreachable(&self, switch: Ipv4Addr) {
        self.unreachable.lock().unwrap().insert(switch);
    }

    fn reachable(&self, switch: Ipv4Addr) -> Result<(), SnmpError> {
        if self.unreachable.lock().unwrap().contains(&switch) {
            return Err(SnmpError::Timeout { host: switch });
        }
        Ok(())
    }
}

#[async_trait]
impl SwitchProbe for ScriptedProbe {
    async fn list_bridge_ports(
        &self,
        switch: Ipv4Addr,
        _community: &str,
    ) -> Result<Vec<BridgePort>, SnmpError> {
        self.reachable(switch)?;
        Ok(self
            .bridge_ports
            .lock()
            .unwrap()
            .get(&switch)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_vlans(&self, switch: Ipv4Addr, _community: &str) -> Result<Vec<Vlan>, SnmpError> {
        self.reachable(switch)?;
        Ok(Vec::new())
    }

    async fn find_mac_port(
        &self,
        switch: Ipv4Addr,
        _community: &str,
        mac: MacAddr,
    ) -> Result<u32, SnmpError> {
        self.reachable(switch)
            .map_err(|_| SnmpError::NotFound { switch, mac })?;
        self.fdb
            .lock()
            .unwrap()
            .get(&(switch, mac))
            .copied()
            .ok_or(SnmpError::NotFound { switch, mac })
    }

    async fn get_admin_status(
        &self,
        switch: Ipv4Addr,
        _community: &str,
        port: u32,
    ) -> Result<AdminStatus, SnmpError> {
        self.reachable(switch)?;
        Ok(self
            .admin
            .lock()
            .unwrap()
            .get(&(switch, port))
            .copied()
            .unwrap_or(AdminStatus::Up))
    }

    async fn set_admin_status(
        &self,
        switch: Ipv4Addr,
        _community: &str,
        port: u32,
        status: AdminStatus,
    ) -> Result<(), SnmpError> {
        self.reachable(switch)?;
        self.admin.lock().unwrap().insert((switch, port), status);
        Ok(())
    }
}
