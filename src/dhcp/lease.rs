// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Lease bodies returned to the relay transport

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Lease time of the fake lease; the client retries almost at once
pub const FAKE_LEASE_SECONDS: u32 = 1;

/// Lease as serialized in responses and in cached lease records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub yiaddr: Ipv4Addr,
    pub router: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub ip_address_lease_time: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_name_servers: Vec<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_identifier: Option<Ipv4Addr>,
}

/// Sentinel lease handed out when no real lease can be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLease {
    pub ip: Ipv4Addr,
    pub router: Ipv4Addr,
    pub mask: Ipv4Addr,
}

impl Default for FakeLease {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::new(140, 117, 1, 1),
            router: Ipv4Addr::new(140, 117, 1, 2),
            mask: Ipv4Addr::new(255, 255, 255, 0),
        }
    }
}

/// Lease parameters that do not depend on the client's location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasePolicy {
    pub lease_seconds: u32,
    pub dns: Vec<Ipv4Addr>,
    pub fake: FakeLease,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            lease_seconds: 3600,
            dns: vec![Ipv4Addr::new(8, 8, 8, 8)],
            fake: FakeLease::default(),
        }
    }
}

impl LeasePolicy {
    /// Real lease for a resolved jack, served through relay `giaddr`
    #[must_use]
    pub fn lease(
        &self,
        yiaddr: Ipv4Addr,
        router: Ipv4Addr,
        subnet_mask: Ipv4Addr,
        giaddr: Ipv4Addr,
    ) -> Lease {
        Lease {
            yiaddr,
            router,
            subnet_mask,
            ip_address_lease_time: self.lease_seconds,
            domain_name_servers: self.dns.clone(),
            server_identifier: Some(giaddr),
        }
    }

    #[must_use]
    pub fn fake_lease(&self, giaddr: Ipv4Addr) -> Lease {
        Lease {
            yiaddr: self.fake.ip,
            router: self.fake.router,
            subnet_mask: self.fake.mask,
            ip_address_lease_time: FAKE_LEASE_SECONDS,
            domain_name_servers: self.dns.clone(),
            server_identifier: Some(giaddr),
        }
    }

    #[must_use]
    pub fn is_fake(&self, ip: Ipv4Addr) -> bool {
        ip == self.fake.ip
    }

    /// MAC lease cache lifetime
    #[must_use]
    pub fn mac_lease_ttl(&self) -> u64 {
        u64::from(self.lease_seconds) * crate::cache::MAC_LEASE_TTL_FACTOR
    }
}
