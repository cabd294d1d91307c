// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Relay transport request body
//!
//! Addresses arrive as byte arrays and options as a map keyed by the decimal
//! option number. The body is decoded once into [`DhcpRequest`]; zero and
//! empty fields become `None`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::DhcpError;
use crate::addr::{MacAddr, ipv4_from_bytes, ipv4_list};

/// Subnet mask option
pub const OPT_SUBNET_MASK: &str = "1";
/// Router option
pub const OPT_ROUTER: &str = "3";
/// Requested IP address option
pub const OPT_REQUESTED_IP: &str = "50";
/// Relay agent information option
pub const OPT_RELAY_AGENT_INFO: &str = "82";

/// JSON body posted to `/discover` and `/request`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DhcpBody {
    #[serde(default)]
    pub giaddr: Vec<u8>,
    #[serde(default)]
    pub chaddr: Vec<u8>,
    #[serde(default)]
    pub xid: Vec<u8>,
    #[serde(default)]
    pub ciaddr: Vec<u8>,
    #[serde(default)]
    pub options: BTreeMap<String, Vec<u8>>,
}

/// Decoded DHCP message as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpRequest {
    /// `0.0.0.0` when the relay did not fill it in
    pub giaddr: Ipv4Addr,
    pub chaddr: MacAddr,
    /// Transaction id as lowercase hex
    pub xid: String,
    pub ciaddr: Option<Ipv4Addr>,
    pub requested_ip: Option<Ipv4Addr>,
    pub option82: Option<Vec<u8>>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Vec<Ipv4Addr>>,
}

fn non_zero(addr: Option<Ipv4Addr>) -> Option<Ipv4Addr> {
    addr.filter(|ip| !ip.is_unspecified())
}

impl TryFrom<DhcpBody> for DhcpRequest {
    type Error = DhcpError;

    fn try_from(mut body: DhcpBody) -> Result<Self, Self::Error> {
        // chaddr is padded to 16 bytes; only the Ethernet address matters
        let chaddr = MacAddr::from_slice(&body.chaddr).ok_or(DhcpError::NotFound("chaddr"))?;
        if body.xid.is_empty() {
            return Err(DhcpError::NotFound("xid"));
        }

        let option = |options: &BTreeMap<String, Vec<u8>>, code: &str| {
            options.get(code).filter(|value| !value.is_empty()).cloned()
        };
        let requested_ip = option(&body.options, OPT_REQUESTED_IP)
            .and_then(|bytes| ipv4_from_bytes(&bytes))
            .filter(|ip| !ip.is_unspecified());
        let subnet_mask =
            option(&body.options, OPT_SUBNET_MASK).and_then(|bytes| ipv4_from_bytes(&bytes));
        let router = option(&body.options, OPT_ROUTER).map(|bytes| ipv4_list(&bytes));

        Ok(Self {
            giaddr: ipv4_from_bytes(&body.giaddr).unwrap_or(Ipv4Addr::UNSPECIFIED),
            chaddr,
            xid: hex::encode(&body.xid),
            ciaddr: non_zero(ipv4_from_bytes(&body.ciaddr)),
            requested_ip,
            option82: body
                .options
                .remove(OPT_RELAY_AGENT_INFO)
                .filter(|value| !value.is_empty()),
            subnet_mask,
            router,
        })
    }
}

impl DhcpRequest {
    /// Relay address, or `NotFound` when the request did not pass a relay
    pub fn relay(&self) -> Result<Ipv4Addr, DhcpError> {
        if self.giaddr.is_unspecified() {
            Err(DhcpError::NotFound("giaddr"))
        } else {
            Ok(self.giaddr)
        }
    }

    pub fn relay_agent_info(&self) -> Result<&[u8], DhcpError> {
        self.option82
            .as_deref()
            .ok_or(DhcpError::NotFound("option 82"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> DhcpBody {
        serde_json::from_str(
            r#"{
                "giaddr": [10, 0, 0, 1],
                "chaddr": [170, 187, 204, 221, 238, 255, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
                "xid": [0, 1, 171, 205],
                "ciaddr": [0, 0, 0, 0],
                "options": {"82": [1, 3, 1, 3, 10], "50": [10, 1, 2, 10], "3": [10, 1, 0, 1]}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_decodes_relay_body() {
        let request = DhcpRequest::try_from(body()).unwrap();
        assert_eq!(request.giaddr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(request.chaddr.to_string(), "aabbccddeeff");
        assert_eq!(request.xid, "0001abcd");
        assert_eq!(request.ciaddr, None);
        assert_eq!(request.requested_ip, Some(Ipv4Addr::new(10, 1, 2, 10)));
        assert_eq!(request.option82.as_deref(), Some(&[1, 3, 1, 3, 10][..]));
        assert_eq!(request.router, Some(vec![Ipv4Addr::new(10, 1, 0, 1)]));
        assert_eq!(request.subnet_mask, None);
    }

    #[test]
    fn test_zero_and_empty_fields_are_absent() {
        let mut body = body();
        body.giaddr = vec![0, 0, 0, 0];
        body.options.insert("82".to_string(), Vec::new());
        body.options.insert("50".to_string(), vec![0, 0, 0, 0]);
        let request = DhcpRequest::try_from(body).unwrap();
        assert!(matches!(request.relay(), Err(DhcpError::NotFound("giaddr"))));
        assert!(matches!(
            request.relay_agent_info(),
            Err(DhcpError::NotFound("option 82"))
        ));
        assert_eq!(request.requested_ip, None);
    }

    #[test]
    fn test_short_chaddr_is_rejected() {
        let mut body = body();
        body.chaddr = vec![1, 2, 3];
        assert!(matches!(
            DhcpRequest::try_from(body),
            Err(DhcpError::NotFound("chaddr"))
        ));
    }
}
