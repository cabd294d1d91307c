// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Registry initialization and metric registration

use crate::metrics::labels::{PortCheckLabels, ResponseLabels, SwitchLabels};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::MetricsRegistry;

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        // counters get the _total suffix from the encoder
        let dhcp_responses = Family::<ResponseLabels, Counter>::default();
        registry.register(
            "dormnet_dhcp_responses",
            "DHCP responses by endpoint and outcome",
            dhcp_responses.clone(),
        );

        let topology_cycle_duration_milliseconds = Gauge::default();
        registry.register(
            "dormnet_topology_cycle_duration_milliseconds",
            "Duration of the last topology cycle in milliseconds",
            topology_cycle_duration_milliseconds.clone(),
        );
        let topology_entries = Gauge::default();
        registry.register(
            "dormnet_topology_entries",
            "Topology entries written by the last cycle",
            topology_entries.clone(),
        );
        let topology_ambiguous_ports = Gauge::default();
        registry.register(
            "dormnet_topology_ambiguous_ports",
            "Edge switches left out of the last cycle because their backbone port was shared",
            topology_ambiguous_ports.clone(),
        );
        let topology_cycles_skipped = Counter::default();
        registry.register(
            "dormnet_topology_cycles_skipped",
            "Topology cycles skipped because the previous one was still running",
            topology_cycles_skipped.clone(),
        );

        let port_bounces = Family::<SwitchLabels, Counter>::default();
        registry.register(
            "dormnet_port_bounces",
            "Ports shut and re-enabled after a device moved",
            port_bounces.clone(),
        );
        let port_checks = Family::<PortCheckLabels, Counter>::default();
        registry.register(
            "dormnet_port_checks",
            "Port verification jobs by result",
            port_checks.clone(),
        );

        Self {
            registry: Arc::new(Mutex::new(registry)),
            dhcp_responses,
            topology_cycle_duration_milliseconds,
            topology_entries,
            topology_ambiguous_ports,
            topology_cycles_skipped,
            port_bounces,
            port_checks,
        }
    }
}
