// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! # Dormnet DHCP
//!
//! Control plane for a dormitory network: finds the switch port a device is
//! plugged into over SNMP and answers DHCP relay requests from that physical
//! location.
//!
//! ## Main modules
//! - `snmp`: switch probe (bridge tables, VLANs, admin status)
//! - `option82`: relay agent information decoding
//! - `topology`: periodic backbone-edge topology builder
//! - `dhcp`: DISCOVER / REQUEST resolution engine
//! - `verify`: port verification worker
//! - `cache`: shared store, key layout and value codec
//! - `inventory`: read-only switch and wiring inventory
//! - `api`: HTTP endpoints
//! - `config`, `error`, `metrics`, `prelude`

pub mod addr;
pub mod api;
pub mod cache;
pub mod config;
pub mod dhcp;
mod error;
pub mod inventory;
pub mod metrics;
pub mod option82;
pub mod prelude;
pub mod snmp;
pub mod topology;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
/// Application configuration
pub use config::Config;

/// Application error and result type
pub use error::{AppError, Result};

/// HTTP API router and state
pub use api::{AppState, create_router};

/// Background roles
pub use topology::{TopologyBuilder, start_topology_builder};
pub use verify::{PortVerifier, start_port_verifier};

/// Metrics registry
pub use metrics::MetricsRegistry;
