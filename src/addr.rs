// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! MAC and IPv4 helpers shared by the probe, the cache codec and the DHCP wire format

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// 48-bit hardware address
///
/// Renders as 12 lowercase hex digits without separators (`aabbccddeeff`),
/// which is also the form used inside cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Takes the first six bytes of a DHCP `chaddr` field
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }

    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// OID suffix addressing this MAC in the bridge forwarding tables
    #[must_use]
    pub fn oid_suffix(&self) -> [u32; 6] {
        self.0.map(u32::from)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Error returned when a MAC string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address: {0}")]
pub struct ParseMacError(pub String);

impl FromStr for MacAddr {
    type Err = ParseMacError;

    /// Accepts `aabbccddeeff`, `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();
        let bytes = hex::decode(&digits).map_err(|_| ParseMacError(s.to_string()))?;
        let octets: [u8; 6] = bytes
            .try_into()
            .map_err(|_| ParseMacError(s.to_string()))?;
        Ok(Self(octets))
    }
}

/// Reads an IPv4 address from the first four bytes of a DHCP field
#[must_use]
pub fn ipv4_from_bytes(bytes: &[u8]) -> Option<Ipv4Addr> {
    let octets: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

/// Reads a list of IPv4 addresses (DHCP options 3 and 6 carry several)
#[must_use]
pub fn ipv4_list(bytes: &[u8]) -> Vec<Ipv4Addr> {
    bytes
        .chunks_exact(4)
        .filter_map(ipv4_from_bytes)
        .collect()
}

/// Converts a prefix length to a dotted netmask; lengths above 32 saturate
#[must_use]
pub fn prefix_to_mask(prefix: u8) -> Ipv4Addr {
    let bits = match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - u32::from(p)),
    };
    Ipv4Addr::from(bits)
}

/// Netmask of a `a.b.c.d/len` subnet string
#[must_use]
pub fn cidr_to_mask(cidr: &str) -> Option<Ipv4Addr> {
    let (_, len) = cidr.trim().split_once('/')?;
    let prefix: u8 = len.parse().ok()?;
    if prefix > 32 {
        return None;
    }
    Some(prefix_to_mask(prefix))
}

/// Milliseconds since the Unix epoch, the timestamp format of queued jobs
#[must_use]
pub fn now_millis() -> u64 {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}
