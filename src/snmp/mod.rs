// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! SNMP topology probe
//!
//! Reads bridge forwarding tables, VLAN lists and interface admin status from
//! managed switches over SNMP v2c. Every call opens its own UDP session with a
//! fixed timeout and closes it when done; nothing is pooled and nothing is
//! retried.

pub mod ber;
mod session;


use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::addr::MacAddr;
use ber::{Oid, Value};
use session::SnmpSession;

/// Session timeout (1 second)
pub const SESSION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Standard SNMP agent port
pub const SNMP_PORT: u16 = 161;

/// Bridge-MIB and IF-MIB objects used by the probe
pub mod oids {
    /// dot1dBasePortIfIndex
    pub const DOT1D_BASE_PORT_IF_INDEX: &[u32] = &[1, 3, 6, 1, 2, 1, 17, 1, 4, 1, 2];
    /// dot1qVlanStaticName
    pub const DOT1Q_VLAN_STATIC_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 17, 7, 1, 4, 3, 1, 1];
    /// dot1dTpFdbPort
    pub const DOT1D_TP_FDB_PORT: &[u32] = &[1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2];
    /// dot1qTpFdbPort
    pub const DOT1Q_TP_FDB_PORT: &[u32] = &[1, 3, 6, 1, 2, 1, 17, 7, 1, 2, 2, 1, 2];
    /// ifAdminStatus
    pub const IF_ADMIN_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 7];
}

/// SNMP probe errors
#[derive(Debug, Error)]
pub enum SnmpError {
    #[error("SNMP request to {host} timed out")]
    Timeout { host: Ipv4Addr },

    #[error("SNMP socket error")]
    Io(#[from] std::io::Error),

    #[error("malformed SNMP message: {0}")]
    Decode(String),

    #[error("SNMP agent {host} returned error status {status} at index {index}")]
    ErrorStatus {
        host: Ipv4Addr,
        status: i64,
        index: i64,
    },

    #[error("no such instance {oid} on {host}")]
    NoSuchInstance { host: Ipv4Addr, oid: String },

    #[error("unexpected value for {oid} on {host}: {value}")]
    UnexpectedValue {
        host: Ipv4Addr,
        oid: String,
        value: String,
    },

    #[error("cannot find port index of {mac} on {switch}")]
    NotFound { switch: Ipv4Addr, mac: MacAddr },

    #[error("invalid admin status '{0}'")]
    InvalidAdminStatus(String),
}

/// ifAdminStatus values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminStatus {
    Up = 1,
    Down = 2,
    Testing = 3,
}

impl TryFrom<i64> for AdminStatus {
    type Error = SnmpError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            2 => Ok(Self::Down),
            3 => Ok(Self::Testing),
            other => Err(SnmpError::InvalidAdminStatus(other.to_string())),
        }
    }
}

impl FromStr for AdminStatus {
    type Err = SnmpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "testing" => Ok(Self::Testing),
            _ => Err(SnmpError::InvalidAdminStatus(s.to_string())),
        }
    }
}

impl fmt::Display for AdminStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Testing => "testing",
        };
        f.write_str(name)
    }
}

/// One row of dot1dBasePortIfIndex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgePort {
    pub bridge_port: u32,
    pub if_index: u32,
}

/// One row of dot1qVlanStaticName
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vlan {
    pub id: u32,
    pub name: String,
}

/// Switch-facing operations used by the topology builder, the DHCP engine
/// and the port verifier
#[async_trait]
pub trait SwitchProbe: Send + Sync {
    async fn list_bridge_ports(
        &self,
        switch: Ipv4Addr,
        community: &str,
    ) -> Result<Vec<BridgePort>, SnmpError>;

    async fn list_vlans(&self, switch: Ipv4Addr, community: &str) -> Result<Vec<Vlan>, SnmpError>;

    /// Bridge port on which `mac` was learned; `SnmpError::NotFound` when
    /// neither forwarding table knows it
    async fn find_mac_port(
        &self,
        switch: Ipv4Addr,
        community: &str,
        mac: MacAddr,
    ) -> Result<u32, SnmpError>;

    async fn get_admin_status(
        &self,
        switch: Ipv4Addr,
        community: &str,
        port: u32,
    ) -> Result<AdminStatus, SnmpError>;

    async fn set_admin_status(
        &self,
        switch: Ipv4Addr,
        community: &str,
        port: u32,
        status: AdminStatus,
    ) -> Result<(), SnmpError>;
}

/// SNMP v2c implementation of [`SwitchProbe`]
#[derive(Debug, Clone)]
pub struct SnmpProbe {
    port: u16,
    timeout: Duration,
}

impl Default for SnmpProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SnmpProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: SNMP_PORT,
            timeout: SESSION_TIMEOUT,
        }
    }

    /// Targets a non-standard agent port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn session(&self, switch: Ipv4Addr, community: &str) -> Result<SnmpSession, SnmpError> {
        SnmpSession::open(switch, self.port, community, self.timeout).await
    }

    /// Reads one FDB port entry in its own session
    async fn fdb_port(&self, switch: Ipv4Addr, community: &str, oid: Oid) -> Result<u32, SnmpError> {
        let session = self.session(switch, community).await?;
        let value = session.get(&oid).await?;
        port_value(switch, &oid, value)
    }

    /// VLAN-unaware forwarding table, addressed directly by the MAC
    async fn find_port_dot1d(
        &self,
        switch: Ipv4Addr,
        community: &str,
        mac: MacAddr,
    ) -> Result<u32, SnmpError> {
        let oid = Oid::from(oids::DOT1D_TP_FDB_PORT).child(&mac.oid_suffix());
        self.fdb_port(switch, community, oid).await
    }

    /// VLAN-aware forwarding table; every VLAN is queried concurrently and
    /// the first VLAN (in agent order) that knows the MAC wins
    async fn find_port_dot1q(
        &self,
        switch: Ipv4Addr,
        community: &str,
        mac: MacAddr,
    ) -> Result<Option<u32>, SnmpError> {
        let vlans = self.list_vlans(switch, community).await?;
        let base = Oid::from(oids::DOT1Q_TP_FDB_PORT);
        let lookups = vlans.iter().map(|vlan| {
            let mut suffix = vec![vlan.id];
            suffix.extend_from_slice(&mac.oid_suffix());
            self.fdb_port(switch, community, base.child(&suffix))
        });

        let results = join_all(lookups).await;
        for (vlan, result) in vlans.iter().zip(&results) {
            if let Err(e) = result {
                tracing::trace!("dot1q lookup of {} on {} vlan {}: {}", mac, switch, vlan.id, e);
            }
        }
        Ok(results.into_iter().find_map(Result::ok))
    }
}

fn port_value(switch: Ipv4Addr, oid: &Oid, value: Value) -> Result<u32, SnmpError> {
    match value {
        Value::Integer(port) if port > 0 => u32::try_from(port).map_err(|_| {
            SnmpError::UnexpectedValue {
                host: switch,
                oid: oid.to_string(),
                value: port.to_string(),
            }
        }),
        Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
            Err(SnmpError::NoSuchInstance {
                host: switch,
                oid: oid.to_string(),
            })
        }
        other => Err(SnmpError::UnexpectedValue {
            host: switch,
            oid: oid.to_string(),
            value: format!("{other:?}"),
        }),
    }
}

fn integer_value(switch: Ipv4Addr, oid: &Oid, value: &Value) -> Result<i64, SnmpError> {
    match value {
        Value::Integer(v) => Ok(*v),
        Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
            Err(SnmpError::NoSuchInstance {
                host: switch,
                oid: oid.to_string(),
            })
        }
        other => Err(SnmpError::UnexpectedValue {
            host: switch,
            oid: oid.to_string(),
            value: format!("{other:?}"),
        }),
    }
}

#[async_trait]
impl SwitchProbe for SnmpProbe {
    async fn list_bridge_ports(
        &self,
        switch: Ipv4Addr,
        community: &str,
    ) -> Result<Vec<BridgePort>, SnmpError> {
        let session = self.session(switch, community).await?;
        let rows = session
            .walk(&Oid::from(oids::DOT1D_BASE_PORT_IF_INDEX))
            .await?;

        let mut ports = Vec::with_capacity(rows.len());
        for (oid, value) in rows {
            let Some(bridge_port) = oid.last() else {
                continue;
            };
            let if_index = integer_value(switch, &oid, &value)?;
            let if_index = u32::try_from(if_index).map_err(|_| SnmpError::UnexpectedValue {
                host: switch,
                oid: oid.to_string(),
                value: if_index.to_string(),
            })?;
            ports.push(BridgePort {
                bridge_port,
                if_index,
            });
        }
        Ok(ports)
    }

    async fn list_vlans(&self, switch: Ipv4Addr, community: &str) -> Result<Vec<Vlan>, SnmpError> {
        let session = self.session(switch, community).await?;
        let rows = session
            .walk(&Oid::from(oids::DOT1Q_VLAN_STATIC_NAME))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(oid, value)| {
                let id = oid.last()?;
                let name = match value {
                    Value::OctetString(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    _ => String::new(),
                };
                Some(Vlan { id, name })
            })
            .collect())
    }

    async fn find_mac_port(
        &self,
        switch: Ipv4Addr,
        community: &str,
        mac: MacAddr,
    ) -> Result<u32, SnmpError> {
        match self.find_port_dot1d(switch, community, mac).await {
            Ok(port) => return Ok(port),
            Err(e) => tracing::trace!("dot1d lookup of {} on {} failed: {}", mac, switch, e),
        }

        match self.find_port_dot1q(switch, community, mac).await {
            Ok(Some(port)) => Ok(port),
            Ok(None) => Err(SnmpError::NotFound { switch, mac }),
            Err(e) => {
                tracing::trace!("dot1q lookup of {} on {} failed: {}", mac, switch, e);
                Err(SnmpError::NotFound { switch, mac })
            }
        }
    }

    async fn get_admin_status(
        &self,
        switch: Ipv4Addr,
        community: &str,
        port: u32,
    ) -> Result<AdminStatus, SnmpError> {
        let oid = Oid::from(oids::IF_ADMIN_STATUS).child(&[port]);
        let session = self.session(switch, community).await?;
        let value = session.get(&oid).await?;
        AdminStatus::try_from(integer_value(switch, &oid, &value)?)
    }

    async fn set_admin_status(
        &self,
        switch: Ipv4Addr,
        community: &str,
        port: u32,
        status: AdminStatus,
    ) -> Result<(), SnmpError> {
        let oid = Oid::from(oids::IF_ADMIN_STATUS).child(&[port]);
        let session = self.session(switch, community).await?;
        let value = session.set(&oid, Value::Integer(status as i64)).await?;
        integer_value(switch, &oid, &value)?;
        tracing::debug!("Set port {} on {} admin {}", port, switch, status);
        Ok(())
    }
}
