// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Read-only switch and wiring inventory
//!
//! The persistent store behind the inventory is not owned by this service;
//! the control plane only needs three queries, expressed by [`Inventory`].

mod snapshot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use thiserror::Error;

pub use snapshot::{InventorySnapshot, SnapshotInventory};

/// Level of aggregation switches
pub const LEVEL_BACKBONE: i32 = 0;
/// Level of access switches cabled to user jacks
pub const LEVEL_EDGE: i32 = -1;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read inventory")]
    Io(#[from] std::io::Error),

    #[error("failed to parse inventory: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("user IP of {switch}:{port} not found")]
    UserIpNotFound { switch: Ipv4Addr, port: u32 },
}

/// One managed switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRecord {
    pub ip: Ipv4Addr,
    /// 12 hex digits, no separators
    pub mac: String,
    pub name: String,
    pub dorm: String,
    /// CIDR, e.g. `10.1.0.0/24`
    pub subnet: String,
    pub level: i32,
    pub community: String,
    #[serde(default)]
    pub uplink: u32,
}

impl SwitchRecord {
    #[must_use]
    pub fn is_backbone(&self) -> bool {
        self.level == LEVEL_BACKBONE
    }

    #[must_use]
    pub fn is_edge(&self) -> bool {
        self.level == LEVEL_EDGE
    }
}

/// A cable run from a switch port to a wall jack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringEntry {
    pub switch_ip: Ipv4Addr,
    pub port: u32,
    pub dorm: String,
    pub room: String,
    pub plug: String,
}

impl WiringEntry {
    /// Wiring identifier of the jack, `{dorm}{room}-{plug}`
    #[must_use]
    pub fn dvo(&self) -> String {
        format!("{}{}-{}", self.dorm, self.room, self.plug)
    }
}

/// Address and gateway assigned to a jack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIp {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

#[async_trait]
pub trait Inventory: Send + Sync {
    /// All switches ordered by dorm, then level descending, then ip ascending
    async fn list_switches(&self) -> Result<Vec<SwitchRecord>, InventoryError>;

    /// Wiring of one switch ordered by port
    async fn list_ports(&self, switch: Ipv4Addr) -> Result<Vec<WiringEntry>, InventoryError>;

    /// Address and gateway for whatever jack is cabled to `switch:port`
    async fn find_user_ip(&self, switch: Ipv4Addr, port: u32) -> Result<UserIp, InventoryError>;
}
