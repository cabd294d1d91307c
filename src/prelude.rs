// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Prelude module for convenient imports
//!
//! ```rust
//! use dormnet_dhcp::prelude::*;
//! ```

// Core types
pub use crate::addr::MacAddr;
pub use crate::config::Config;
pub use crate::error::{AppError, Result};

// Collaborators
pub use crate::cache::{KvStore, MemoryStore, RedisStore};
pub use crate::inventory::{Inventory, SnapshotInventory};
pub use crate::snmp::{AdminStatus, SnmpProbe, SwitchProbe};

// Roles
pub use crate::dhcp::{DhcpEngine, DhcpError, DhcpRequest, Lease};
pub use crate::metrics::MetricsRegistry;
pub use crate::topology::TopologyBuilder;
pub use crate::verify::PortVerifier;
