// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Application state shared across HTTP handlers

use std::sync::Arc;

use crate::config::Config;
use crate::dhcp::DhcpEngine;
use crate::inventory::Inventory;
use crate::metrics::MetricsRegistry;
use crate::snmp::SwitchProbe;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub metrics: MetricsRegistry,
    pub engine: DhcpEngine,
    pub inventory: Arc<dyn Inventory>,
    pub probe: Arc<dyn SwitchProbe>,
}
