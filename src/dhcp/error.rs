// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use std::net::Ipv4Addr;
use thiserror::Error;

use crate::addr::MacAddr;
use crate::cache::{CacheError, CodecError};
use crate::inventory::InventoryError;
use crate::option82::Option82Error;
use crate::snmp::SnmpError;

/// Every way a DISCOVER or REQUEST can stop short of a lease
#[derive(Debug, Error)]
pub enum DhcpError {
    /// A required request field or cache entry is absent
    #[error("{0} not found")]
    NotFound(&'static str),

    /// SNMP transport failure other than a missing FDB entry
    #[error(transparent)]
    Snmp(SnmpError),

    #[error("cannot find port index of {mac} on {switch}")]
    SnmpNotFound { switch: Ipv4Addr, mac: MacAddr },

    #[error("user IP of {switch}:{port} not found")]
    UserIpNotFound { switch: Ipv4Addr, port: u32 },

    #[error("{option} mismatch: resolved {resolved}, client declared {declared}")]
    OptionMismatch {
        option: &'static str,
        resolved: Ipv4Addr,
        declared: String,
    },

    #[error("xid {xid} was not granted a fake lease")]
    XidNotMatched { xid: String },

    #[error("{chaddr} already holds {pending} pending fake leases")]
    RateLimited { chaddr: MacAddr, pending: usize },

    #[error("no option 82 rule for switch model '{model}'")]
    VendorUnrecognized { model: String },

    #[error("malformed option 82: {0}")]
    Option82(#[from] Option82Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Inventory(InventoryError),
}

impl From<SnmpError> for DhcpError {
    fn from(err: SnmpError) -> Self {
        match err {
            SnmpError::NotFound { switch, mac } => Self::SnmpNotFound { switch, mac },
            other => Self::Snmp(other),
        }
    }
}

impl From<InventoryError> for DhcpError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::UserIpNotFound { switch, port } => Self::UserIpNotFound { switch, port },
            other => Self::Inventory(other),
        }
    }
}

impl DhcpError {
    /// Whether the engine moves on to the next lease source instead of
    /// failing the request
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::SnmpNotFound { .. }
                | Self::UserIpNotFound { .. }
                | Self::Snmp(SnmpError::Timeout { .. })
                | Self::VendorUnrecognized { .. }
                | Self::Option82(_)
        )
    }
}
