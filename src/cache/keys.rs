// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Cache key layout shared with every process using the store

use std::net::Ipv4Addr;

use crate::addr::MacAddr;

/// `backboneIp:port` → edge switch reached through that backbone port
#[must_use]
pub fn topology(backbone: Ipv4Addr, port: u32) -> String {
    format!("{backbone}:{port}")
}

/// `switchIp:info` → identity of a backbone or edge switch
#[must_use]
pub fn switch_info(switch: Ipv4Addr) -> String {
    format!("{switch}:info")
}

/// `edgeIp:chaddr` → last lease resolved for this MAC on this edge
#[must_use]
pub fn mac_lease(edge: Ipv4Addr, mac: MacAddr) -> String {
    format!("{edge}:{mac}")
}

/// `chaddr:xid` → lease staged by DISCOVER
#[must_use]
pub fn staged_xid(mac: MacAddr, xid: &str) -> String {
    format!("{mac}:{xid}")
}

/// `chaddr:fake_ip` → xids granted a fake lease
#[must_use]
pub fn fake_pending(mac: MacAddr) -> String {
    format!("{mac}:fake_ip")
}
