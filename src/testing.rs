// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Scripted switch probe and fixtures for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::Mutex;
use tokio::time::Instant;

use crate::addr::MacAddr;
use crate::cache::SwitchInfo;
use crate::inventory::SwitchRecord;
use crate::snmp::{AdminStatus, BridgePort, SnmpError, SwitchProbe, Vlan};

pub(crate) const CLIENT_MAC: MacAddr = MacAddr::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// A recorded `set_admin_status` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AdminCall {
    pub switch: Ipv4Addr,
    pub port: u32,
    pub status: AdminStatus,
    pub at: Instant,
}

/// Probe answering from scripted FDB observations
///
/// Each MAC lookup consumes the next scripted port; the last one repeats.
#[derive(Default)]
pub(crate) struct ScriptedProbe {
    fdb: Mutex<HashMap<(Ipv4Addr, MacAddr), VecDeque<u32>>>,
    unreachable: Mutex<HashSet<Ipv4Addr>>,
    bridge_ports: Mutex<HashMap<Ipv4Addr, Vec<BridgePort>>>,
    admin: Mutex<HashMap<(Ipv4Addr, u32), AdminStatus>>,
    admin_calls: Mutex<Vec<AdminCall>>,
    admin_reads: Mutex<usize>,
    lookups: Mutex<Vec<(Ipv4Addr, MacAddr)>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learn(&self, switch: Ipv4Addr, mac: MacAddr, ports: &[u32]) {
        self.fdb
            .lock()
            .unwrap()
            .insert((switch, mac), ports.iter().copied().collect());
    }

    pub fn unreachable(&self, switch: Ipv4Addr) {
        self.unreachable.lock().unwrap().insert(switch);
    }

    pub fn bridge_ports(&self, switch: Ipv4Addr, ports: Vec<BridgePort>) {
        self.bridge_ports.lock().unwrap().insert(switch, ports);
    }

    pub fn admin_status(&self, switch: Ipv4Addr, port: u32, status: AdminStatus) {
        self.admin.lock().unwrap().insert((switch, port), status);
    }

    pub fn admin_calls(&self) -> Vec<AdminCall> {
        self.admin_calls.lock().unwrap().clone()
    }

    pub fn admin_reads(&self) -> usize {
        *self.admin_reads.lock().unwrap()
    }

    pub fn lookups(&self) -> Vec<(Ipv4Addr, MacAddr)> {
        self.lookups.lock().unwrap().clone()
    }

    fn check_reachable(&self, switch: Ipv4Addr) -> Result<(), SnmpError> {
        if self.unreachable.lock().unwrap().contains(&switch) {
            Err(SnmpError::Timeout { host: switch })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SwitchProbe for ScriptedProbe {
    async fn list_bridge_ports(
        &self,
        switch: Ipv4Addr,
        _community: &str,
    ) -> Result<Vec<BridgePort>, SnmpError> {
        self.check_reachable(switch)?;
        Ok(self
            .bridge_ports
            .lock()
            .unwrap()
            .get(&switch)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_vlans(&self, switch: Ipv4Addr, _community: &str) -> Result<Vec<Vlan>, SnmpError> {
        self.check_reachable(switch)?;
        Ok(vec![Vlan {
            id: 1,
            name: "default".to_string(),
        }])
    }

    async fn find_mac_port(
        &self,
        switch: Ipv4Addr,
        _community: &str,
        mac: MacAddr,
    ) -> Result<u32, SnmpError> {
        self.lookups.lock().unwrap().push((switch, mac));
        if self.check_reachable(switch).is_err() {
            return Err(SnmpError::NotFound { switch, mac });
        }
        let mut fdb = self.fdb.lock().unwrap();
        let ports = fdb
            .get_mut(&(switch, mac))
            .ok_or(SnmpError::NotFound { switch, mac })?;
        let port = if ports.len() > 1 {
            ports.pop_front()
        } else {
            ports.front().copied()
        };
        port.ok_or(SnmpError::NotFound { switch, mac })
    }

    async fn get_admin_status(
        &self,
        switch: Ipv4Addr,
        _community: &str,
        port: u32,
    ) -> Result<AdminStatus, SnmpError> {
        *self.admin_reads.lock().unwrap() += 1;
        self.check_reachable(switch)?;
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
        self.check_reachable(switch)?;
        self.admin.lock().unwrap().insert((switch, port), status);
        self.admin_calls.lock().unwrap().push(AdminCall {
            switch,
            port,
            status,
            at: Instant::now(),
        });
        Ok(())
    }
}

pub(crate) fn switch_record(ip: [u8; 4], name: &str, dorm: &str, level: i32) -> SwitchRecord {
    let ip = Ipv4Addr::from(ip);
    let octets = ip.octets();
    SwitchRecord {
        ip,
        mac: format!("0000000000{:02x}", octets[3]),
        name: name.to_string(),
        dorm: dorm.to_string(),
        subnet: "10.1.0.0/24".to_string(),
        level,
        community: "pub".to_string(),
        uplink: 0,
    }
}

pub(crate) fn switch_info(ip: [u8; 4], name: &str) -> SwitchInfo {
    let record = switch_record(ip, name, "A", -1);
    SwitchInfo {
        ip: record.ip,
        mac: record.mac,
        name: record.name,
        dorm: record.dorm,
        mask: Ipv4Addr::new(255, 255, 255, 0),
        community: record.community,
    }
}
