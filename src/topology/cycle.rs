// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! One topology cycle: which backbone port leads to which edge switch

use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::addr::MacAddr;
use crate::cache::{KvStore, SwitchInfo, TOPOLOGY_TTL_SECS, keys};
use crate::inventory::{Inventory, SwitchRecord};
use crate::metrics::MetricsRegistry;
use crate::snmp::SwitchProbe;

/// Where an edge switch MAC showed up on a backbone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Only this edge was seen behind the port
    Unique(u32),
    /// Several edges share the port; none of them can be attributed
    Ambiguous(u32),
    /// The lookup failed
    Absent,
}

/// Marks every port reported for more than one edge as ambiguous
#[must_use]
pub fn attribute_ports(ports: &[Option<u32>]) -> Vec<Observation> {
    let mut seen: HashMap<u32, usize> = HashMap::new();
    for port in ports.iter().flatten() {
        *seen.entry(*port).or_default() += 1;
    }
    ports
        .iter()
        .map(|port| match port {
            Some(port) if seen.get(port).copied().unwrap_or(0) > 1 => Observation::Ambiguous(*port),
            Some(port) => Observation::Unique(*port),
            None => Observation::Absent,
        })
        .collect()
}

/// Backbone and edge switches of one dorm
#[derive(Debug, Default)]
struct Dorm {
    backbones: Vec<SwitchRecord>,
    edges: Vec<SwitchRecord>,
}

/// Groups switches by dorm, keeping the inventory order within each role
fn group_by_dorm(switches: Vec<SwitchRecord>) -> BTreeMap<String, Dorm> {
    let mut dorms: BTreeMap<String, Dorm> = BTreeMap::new();
    for switch in switches {
        let dorm = dorms.entry(switch.dorm.clone()).or_default();
        if switch.is_backbone() {
            dorm.backbones.push(switch);
        } else if switch.is_edge() {
            dorm.edges.push(switch);
        }
    }
    dorms
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dorms: usize,
    pub backbones: usize,
    pub entries: usize,
    pub ambiguous: usize,
    pub unobserved: usize,
    pub duration: Duration,
}

#[derive(Debug, Default)]
struct BackboneReport {
    entries: usize,
    ambiguous: usize,
    unobserved: usize,
}

/// Clears the running flag when the cycle ends, however it ends
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Backbone-edge topology builder
pub struct TopologyBuilder {
    store: Arc<dyn KvStore>,
    probe: Arc<dyn SwitchProbe>,
    inventory: Arc<dyn Inventory>,
    metrics: MetricsRegistry,
    running: AtomicBool,
}

impl TopologyBuilder {
    pub fn new(
        store: Arc<dyn KvStore>,
        probe: Arc<dyn SwitchProbe>,
        inventory: Arc<dyn Inventory>,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            store,
            probe,
            inventory,
            metrics,
            running: AtomicBool::new(false),
        }
    }

    /// Runs a cycle unless one is already in progress
    ///
    /// Returns `None` when the cycle was skipped; skipped cycles are not
    /// queued.
    pub async fn try_run_cycle(&self) -> Option<CycleReport> {
        let Some(_guard) = CycleGuard::acquire(&self.running) else {
            tracing::info!("Topology cycle still running, skipping");
            self.metrics.record_cycle_skipped();
            return None;
        };
        Some(self.run_cycle().await)
    }

    async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let switches = match self.inventory.list_switches().await {
            Ok(switches) => switches,
            Err(e) => {
                tracing::warn!("Topology cycle aborted, cannot list switches: {}", e);
                return CycleReport::default();
            }
        };

        let dorms = group_by_dorm(switches);
        let mut report = CycleReport::default();
        let mut lookups = Vec::new();
        for (name, dorm) in &dorms {
            if dorm.backbones.is_empty() || dorm.edges.is_empty() {
                tracing::debug!("Dorm {} lacks backbone or edge switches, skipping", name);
                continue;
            }
            report.dorms += 1;
            for backbone in &dorm.backbones {
                lookups.push(self.map_backbone(backbone, &dorm.edges));
            }
        }

        report.backbones = lookups.len();
        for result in join_all(lookups).await {
            report.entries += result.entries;
            report.ambiguous += result.ambiguous;
            report.unobserved += result.unobserved;
        }
        report.duration = started.elapsed();

        self.metrics.record_topology_cycle(
            report.duration.as_secs_f64(),
            report.entries,
            report.ambiguous,
        );
        tracing::info!(
            "Topology cycle: {} dorms, {} backbones, {} entries, {} ambiguous, {} unobserved in {:.3}s",
            report.dorms,
            report.backbones,
            report.entries,
            report.ambiguous,
            report.unobserved,
            report.duration.as_secs_f64()
        );
        report
    }

    /// Looks up every edge MAC on one backbone and caches the unambiguous
    /// attributions
    async fn map_backbone(&self, backbone: &SwitchRecord, edges: &[SwitchRecord]) -> BackboneReport {
        let lookups = edges.iter().map(|edge| self.observe(backbone, edge));
        let ports = join_all(lookups).await;
        let observations = attribute_ports(&ports);

        let mut report = BackboneReport::default();
        self.write_info(backbone).await;
        for (edge, observation) in edges.iter().zip(observations) {
            match observation {
                Observation::Unique(port) => {
                    if self.write_entry(backbone.ip, port, edge).await {
                        report.entries += 1;
                    }
                }
                Observation::Ambiguous(port) => {
                    tracing::debug!(
                        "Port {} of {} is shared, not attributing {}",
                        port,
                        backbone.ip,
                        edge.ip
                    );
                    report.ambiguous += 1;
                }
                Observation::Absent => report.unobserved += 1,
            }
        }
        report
    }

    async fn observe(&self, backbone: &SwitchRecord, edge: &SwitchRecord) -> Option<u32> {
        let mac: MacAddr = match edge.mac.parse() {
            Ok(mac) => mac,
            Err(e) => {
                tracing::warn!("Edge switch {} has no usable MAC: {}", edge.ip, e);
                return None;
            }
        };
        match self
            .probe
            .find_mac_port(backbone.ip, &backbone.community, mac)
            .await
        {
            Ok(port) => Some(port),
            Err(e) => {
                tracing::debug!("Edge {} not seen on {}: {}", edge.ip, backbone.ip, e);
                None
            }
        }
    }

    async fn write_info(&self, switch: &SwitchRecord) -> Option<SwitchInfo> {
        let info = match SwitchInfo::from_record(switch) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Skipping switch {}: {}", switch.ip, e);
                return None;
            }
        };
        if let Err(e) = self
            .store
            .set_ex(&keys::switch_info(switch.ip), &info.encode(), TOPOLOGY_TTL_SECS)
            .await
        {
            tracing::warn!("Failed to cache info of {}: {}", switch.ip, e);
            return None;
        }
        Some(info)
    }

    async fn write_entry(&self, backbone: Ipv4Addr, port: u32, edge: &SwitchRecord) -> bool {
        let Some(info) = self.write_info(edge).await else {
            return false;
        };
        match self
            .store
            .set_ex(&keys::topology(backbone, port), &info.encode(), TOPOLOGY_TTL_SECS)
            .await
        {
            Ok(()) => {
                tracing::trace!("{}:{} -> {}", backbone, port, edge.ip);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to cache {}:{}: {}", backbone, port, e);
                false
            }
        }
    }
}
