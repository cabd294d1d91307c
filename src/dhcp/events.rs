// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! DHCP decision feed published on the `dhcp` channel

use serde::Serialize;
use std::net::Ipv4Addr;

use super::{DhcpRequest, Lease};
use crate::addr::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Discover,
    Request,
}

impl MessageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Request => "request",
        }
    }
}

/// One decision, successful or not
#[derive(Debug, Clone, Serialize)]
pub struct DhcpEvent {
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub xid: String,
    pub chaddr: String,
    pub edge: Option<Ipv4Addr>,
    pub fake: bool,
    pub port: Option<u32>,
    pub yiaddr: Option<Ipv4Addr>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub requested_ip: Option<Ipv4Addr>,
    pub error: Option<String>,
}

impl DhcpEvent {
    #[must_use]
    pub fn new(kind: MessageKind, request: &DhcpRequest) -> Self {
        Self {
            timestamp: now_millis(),
            kind,
            xid: request.xid.clone(),
            chaddr: request.chaddr.to_string(),
            edge: None,
            fake: false,
            port: None,
            yiaddr: None,
            subnet_mask: None,
            router: None,
            requested_ip: request.requested_ip,
            error: None,
        }
    }

    #[must_use]
    pub fn with_lease(mut self, lease: &Lease, fake: bool) -> Self {
        self.yiaddr = Some(lease.yiaddr);
        self.subnet_mask = Some(lease.subnet_mask);
        self.router = Some(lease.router);
        self.fake = fake;
        self
    }

    #[must_use]
    pub fn with_location(mut self, edge: Option<Ipv4Addr>, port: Option<u32>) -> Self {
        self.edge = edge;
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: &impl std::fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }
}
