// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Metrics registry and update logic

mod init;
mod update;

use crate::metrics::labels::{PortCheckLabels, ResponseLabels, SwitchLabels};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Mutex<Registry>>,
    // DHCP responses by endpoint and outcome
    dhcp_responses: Family<ResponseLabels, Counter>,
    // topology builder
    topology_cycle_duration_milliseconds: Gauge,
    topology_entries: Gauge,
    topology_ambiguous_ports: Gauge,
    topology_cycles_skipped: Counter,
    // port verifier
    port_bounces: Family<SwitchLabels, Counter>,
    port_checks: Family<PortCheckLabels, Counter>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub async fn encode_metrics(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let registry = self.registry.lock().await;
        let mut buffer = String::new();
        encode(&mut buffer, &registry)?;
        Ok(buffer)
    }
}
