// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Typed records behind the colon-delimited cache values
//!
//! | Record | Layout |
//! |---|---|
//! | [`SwitchInfo`] | `ip:mac:name:dorm:dottedMask:community` |
//! | [`LeaseRecord`] | `edgeIp:portIndex:leaseJSON` |
//! | [`VerificationJob`] | `edgeIp:portIndex:chaddr:observedAtMillis` |

use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::addr::{MacAddr, cidr_to_mask, now_millis};
use crate::dhcp::Lease;
use crate::inventory::SwitchRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {what} value '{value}'")]
pub struct CodecError {
    pub what: &'static str,
    pub value: String,
}

impl CodecError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

/// Cached identity of a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchInfo {
    pub ip: Ipv4Addr,
    pub mac: String,
    pub name: String,
    pub dorm: String,
    pub mask: Ipv4Addr,
    pub community: String,
}

impl SwitchInfo {
    /// Builds the cached identity from an inventory row, turning its CIDR
    /// subnet into a dotted mask
    pub fn from_record(record: &SwitchRecord) -> Result<Self, CodecError> {
        let mask =
            cidr_to_mask(&record.subnet).ok_or_else(|| CodecError::new("subnet", &record.subnet))?;
        Ok(Self {
            ip: record.ip,
            mac: record.mac.clone(),
            name: record.name.clone(),
            dorm: record.dorm.clone(),
            mask,
            community: record.community.clone(),
        })
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.ip, self.mac, self.name, self.dorm, self.mask, self.community
        )
    }

    /// The community is the last field and may itself contain colons
    pub fn decode(value: &str) -> Result<Self, CodecError> {
        let err = || CodecError::new("switch info", value);
        let mut fields = value.splitn(6, ':');
        let mut next = || fields.next().ok_or_else(err);

        let ip = next()?.parse().map_err(|_| err())?;
        let mac = next()?.to_string();
        let name = next()?.to_string();
        let dorm = next()?.to_string();
        let mask = next()?.parse().map_err(|_| err())?;
        let community = next()?.to_string();

        Ok(Self {
            ip,
            mac,
            name,
            dorm,
            mask,
            community,
        })
    }
}

/// A lease pinned to the edge switch port it was resolved for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    pub edge: Ipv4Addr,
    pub port: u32,
    pub lease: Lease,
}

impl LeaseRecord {
    pub fn encode(&self) -> Result<String, CodecError> {
        let json = serde_json::to_string(&self.lease)
            .map_err(|e| CodecError::new("lease", &e.to_string()))?;
        Ok(format!("{}:{}:{}", self.edge, self.port, json))
    }

    pub fn decode(value: &str) -> Result<Self, CodecError> {
        let err = || CodecError::new("lease record", value);
        let mut fields = value.splitn(3, ':');
        let edge = fields.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let port = fields.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let lease = serde_json::from_str(fields.next().ok_or_else(err)?).map_err(|_| err())?;
        Ok(Self { edge, port, lease })
    }
}

/// Port re-check task queued after a successful REQUEST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationJob {
    pub edge: Ipv4Addr,
    pub port: u32,
    pub mac: MacAddr,
    pub observed_at_millis: u64,
}

impl VerificationJob {
    /// A job observed right now
    #[must_use]
    pub fn observed_now(edge: Ipv4Addr, port: u32, mac: MacAddr) -> Self {
        Self {
            edge,
            port,
            mac,
            observed_at_millis: now_millis(),
        }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.edge, self.port, self.mac, self.observed_at_millis
        )
    }

    pub fn decode(value: &str) -> Result<Self, CodecError> {
        let err = || CodecError::new("verification job", value);
        let fields: Vec<&str> = value.split(':').collect();
        let [edge, port, mac, observed] = fields.as_slice() else {
            return Err(err());
        };
        Ok(Self {
            edge: edge.parse().map_err(|_| err())?,
            port: port.parse().map_err(|_| err())?,
            mac: mac.parse().map_err(|_| err())?,
            observed_at_millis: observed.parse().map_err(|_| err())?,
        })
    }
}

impl fmt::Display for VerificationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} port {} on {}", self.mac, self.port, self.edge)
    }
}
