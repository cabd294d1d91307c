// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Configuration module for the DHCP control plane
//!
//! Loads configuration from environment variables, falling back to the
//! defaults below for anything unset or unparsable.

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use crate::dhcp::{EngineConfig, FakeLease, LeasePolicy};

#[cfg(test)]
mod tests;

/// Default configuration values
pub mod defaults {
    use std::net::Ipv4Addr;

    pub const SERVER_ADDR: &str = "0.0.0.0:3000";
    pub const REDIS_URL: &str = "redis://127.0.0.1:6379";
    pub const INVENTORY_PATH: &str = "inventory.json";
    pub const TOPOLOGY_INTERVAL_SECONDS: u64 = 900;
    pub const DHCP_LEASE_SECONDS: u32 = 3600;
    pub const DHCP_DNS: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
    pub const FAKE_LEASE_IP: Ipv4Addr = Ipv4Addr::new(140, 117, 1, 1);
    pub const FAKE_LEASE_ROUTER: Ipv4Addr = Ipv4Addr::new(140, 117, 1, 2);
    pub const FAKE_LEASE_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
}

/// Environment variable names used by the application
pub mod env_vars {
    pub const SERVER_ADDR: &str = "SERVER_ADDR";
    pub const REDIS_URL: &str = "REDIS_URL";
    pub const INVENTORY_PATH: &str = "INVENTORY_PATH";
    pub const TOPOLOGY_INTERVAL_SECONDS: &str = "TOPOLOGY_INTERVAL_SECONDS";
    pub const DHCP_LEASE_SECONDS: &str = "DHCP_LEASE_SECONDS";
    pub const DHCP_DNS: &str = "DHCP_DNS";
    pub const FAKE_LEASE_IP: &str = "FAKE_LEASE_IP";
    pub const FAKE_LEASE_ROUTER: &str = "FAKE_LEASE_ROUTER";
    pub const FAKE_LEASE_MASK: &str = "FAKE_LEASE_MASK";
    pub const ENABLE_HTTP: &str = "ENABLE_HTTP";
    pub const ENABLE_TOPOLOGY_BUILDER: &str = "ENABLE_TOPOLOGY_BUILDER";
    pub const ENABLE_PORT_VERIFIER: &str = "ENABLE_PORT_VERIFIER";
    pub const DHCP_EVENTS: &str = "DHCP_EVENTS";
}

/// Application-wide configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub redis_url: String,
    pub inventory_path: String,
    pub topology_interval_secs: u64,
    pub lease: LeasePolicy,
    pub publish_events: bool,
    /// Serve `/discover`, `/request` and the diagnostics
    pub enable_http: bool,
    pub enable_topology_builder: bool,
    pub enable_port_verifier: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: defaults::SERVER_ADDR.to_string(),
            redis_url: defaults::REDIS_URL.to_string(),
            inventory_path: defaults::INVENTORY_PATH.to_string(),
            topology_interval_secs: defaults::TOPOLOGY_INTERVAL_SECONDS,
            lease: LeasePolicy {
                lease_seconds: defaults::DHCP_LEASE_SECONDS,
                dns: vec![defaults::DHCP_DNS],
                fake: FakeLease {
                    ip: defaults::FAKE_LEASE_IP,
                    router: defaults::FAKE_LEASE_ROUTER,
                    mask: defaults::FAKE_LEASE_MASK,
                },
            },
            publish_events: true,
            enable_http: true,
            enable_topology_builder: true,
            enable_port_verifier: true,
        }
    }
}

/// Parses `name` if set; unparsable values keep the default
fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            default
        }),
        None => default,
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    match lookup(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                tracing::warn!("Invalid {} '{}', using default", name, raw);
                default
            }
        },
        None => default,
    }
}

fn parse_dns(lookup: &impl Fn(&str) -> Option<String>, default: Vec<Ipv4Addr>) -> Vec<Ipv4Addr> {
    let Some(raw) = lookup(env_vars::DHCP_DNS) else {
        return default;
    };
    let parsed: Result<Vec<Ipv4Addr>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect();
    match parsed {
        Ok(dns) => dns,
        Err(e) => {
            tracing::warn!("Invalid {} '{}': {}. Using default.", env_vars::DHCP_DNS, raw, e);
            default
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = Config::default();

        let lease = LeasePolicy {
            lease_seconds: parse_or(&lookup, env_vars::DHCP_LEASE_SECONDS, base.lease.lease_seconds),
            dns: parse_dns(&lookup, base.lease.dns),
            fake: FakeLease {
                ip: parse_or(&lookup, env_vars::FAKE_LEASE_IP, base.lease.fake.ip),
                router: parse_or(&lookup, env_vars::FAKE_LEASE_ROUTER, base.lease.fake.router),
                mask: parse_or(&lookup, env_vars::FAKE_LEASE_MASK, base.lease.fake.mask),
            },
        };

        Config {
            server_addr: lookup(env_vars::SERVER_ADDR).unwrap_or(base.server_addr),
            redis_url: lookup(env_vars::REDIS_URL).unwrap_or(base.redis_url),
            inventory_path: lookup(env_vars::INVENTORY_PATH).unwrap_or(base.inventory_path),
            topology_interval_secs: parse_or(
                &lookup,
                env_vars::TOPOLOGY_INTERVAL_SECONDS,
                base.topology_interval_secs,
            ),
            lease,
            publish_events: parse_flag(&lookup, env_vars::DHCP_EVENTS, base.publish_events),
            enable_http: parse_flag(&lookup, env_vars::ENABLE_HTTP, base.enable_http),
            enable_topology_builder: parse_flag(
                &lookup,
                env_vars::ENABLE_TOPOLOGY_BUILDER,
                base.enable_topology_builder,
            ),
            enable_port_verifier: parse_flag(
                &lookup,
                env_vars::ENABLE_PORT_VERIFIER,
                base.enable_port_verifier,
            ),
        }
    }

    /// Validates values that would make a role useless
    pub fn validate(&self) -> Result<(), String> {
        if self.topology_interval_secs == 0 {
            return Err("Topology interval must be greater than zero".to_string());
        }
        if self.lease.lease_seconds == 0 {
            return Err("Lease time must be greater than zero".to_string());
        }
        if self.lease.dns.is_empty() {
            return Err("At least one DNS server is required".to_string());
        }
        if !(self.enable_http || self.enable_topology_builder || self.enable_port_verifier) {
            return Err("Every role is disabled".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn topology_interval(&self) -> Duration {
        Duration::from_secs(self.topology_interval_secs)
    }

    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            policy: self.lease.clone(),
            publish_events: self.publish_events,
        }
    }
}
