// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Periodic backbone-edge topology builder
//!
//! Every interval the builder asks each backbone switch where it has learned
//! the MAC of each edge switch in the same dorm, and caches the answers as
//! `backboneIp:port` entries that age out after 30 minutes.

mod cycle;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use cycle::{CycleReport, Observation, TopologyBuilder, attribute_ports};

/// Starts the builder loop
///
/// Each tick spawns its own cycle, so a cycle that outlives the interval
/// makes the next tick skip instead of delaying it.
pub fn start_topology_builder(
    mut shutdown_rx: watch::Receiver<bool>,
    builder: Arc<TopologyBuilder>,
    interval: Duration,
) -> JoinHandle<()> {
    tracing::info!(
        "Starting topology builder every {}s",
        interval.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Stopping topology builder");
                        break;
                    }
                    continue;
                }
            }

            let builder = builder.clone();
            tokio::spawn(async move {
                builder.try_run_cycle().await;
            });
        }
    })
}
