// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Port verification worker
//!
//! Every notification on `check_port:notify` pops one job from the
//! `check_port` queue. After the forwarding tables settle the job's MAC is
//! looked up again; if it now shows up on another port the device moved, and
//! that port is shut and re-enabled so the device asks for a new lease from
//! its new jack.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::addr::now_millis;
use crate::cache::{
    CHECK_PORT_CHANNEL, CHECK_PORT_QUEUE, CacheError, KvStore, SwitchInfo, VerificationJob, keys,
};
use crate::metrics::MetricsRegistry;
use crate::snmp::{AdminStatus, SnmpError, SwitchProbe};

/// Time the switch gets to update its forwarding table after the REQUEST
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
/// How long a relocated port stays down
pub const BOUNCE_HOLD: Duration = Duration::from_secs(5);

/// What happened to one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Queue was already drained
    Idle,
    /// Job could not be processed (malformed, or edge switch unknown)
    Dropped,
    Unchanged,
    Relocated { from: u32, to: u32 },
    Failed,
}

impl CheckOutcome {
    fn metric_result(&self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::Unchanged => Some("unchanged"),
            Self::Relocated { .. } => Some("relocated"),
            Self::Dropped | Self::Failed => Some("failed"),
        }
    }
}

pub struct PortVerifier {
    store: Arc<dyn KvStore>,
    probe: Arc<dyn SwitchProbe>,
    metrics: MetricsRegistry,
}

impl PortVerifier {
    pub fn new(
        store: Arc<dyn KvStore>,
        probe: Arc<dyn SwitchProbe>,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            store,
            probe,
            metrics,
        }
    }

    /// Pops and processes exactly one job
    pub async fn process_next(&self) -> CheckOutcome {
        let outcome = match self.store.lpop(CHECK_PORT_QUEUE).await {
            Ok(Some(raw)) => match VerificationJob::decode(&raw) {
                Ok(job) => self.verify(job).await,
                Err(e) => {
                    tracing::warn!("Dropping port check: {}", e);
                    CheckOutcome::Dropped
                }
            },
            Ok(None) => CheckOutcome::Idle,
            Err(e) => {
                tracing::warn!("Failed to pop port check: {}", e);
                CheckOutcome::Failed
            }
        };
        if let Some(result) = outcome.metric_result() {
            self.metrics.record_port_check(result);
        }
        outcome
    }

    async fn verify(&self, job: VerificationJob) -> CheckOutcome {
        let edge = match self.edge_info(job.edge).await {
            Ok(Some(edge)) => edge,
            Ok(None) => {
                tracing::warn!("No cached info for {}, dropping check of {}", job.edge, job);
                return CheckOutcome::Dropped;
            }
            Err(e) => {
                tracing::warn!("Cannot read info for {}: {}", job.edge, e);
                return CheckOutcome::Failed;
            }
        };

        settle(job.observed_at_millis).await;

        let port = match self
            .probe
            .find_mac_port(edge.ip, &edge.community, job.mac)
            .await
        {
            Ok(port) => port,
            Err(e) => {
                tracing::warn!("Re-check of {} failed: {}", job, e);
                return CheckOutcome::Failed;
            }
        };
        if port == job.port {
            tracing::debug!("{} unchanged", job);
            return CheckOutcome::Unchanged;
        }

        tracing::info!(
            chaddr = %job.mac,
            edge = %edge.ip,
            "Device moved from port {} to {}",
            job.port,
            port
        );
        match self.bounce(&edge, port).await {
            Ok(()) => {
                self.metrics.record_port_bounce(&edge.ip.to_string());
                CheckOutcome::Relocated {
                    from: job.port,
                    to: port,
                }
            }
            Err(e) => {
                tracing::error!("Failed to bounce port {} on {}: {}", port, edge.ip, e);
                CheckOutcome::Failed
            }
        }
    }

    async fn edge_info(&self, edge: Ipv4Addr) -> Result<Option<SwitchInfo>, CacheError> {
        match self.store.get(&keys::switch_info(edge)).await? {
            Some(value) => Ok(Some(SwitchInfo::decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Shuts the port, holds, and brings it back up
    async fn bounce(&self, edge: &SwitchInfo, port: u32) -> Result<(), SnmpError> {
        self.probe
            .set_admin_status(edge.ip, &edge.community, port, AdminStatus::Down)
            .await?;
        tokio::time::sleep(BOUNCE_HOLD).await;
        self.probe
            .set_admin_status(edge.ip, &edge.community, port, AdminStatus::Up)
            .await?;
        Ok(())
    }
}

/// Waits until `SETTLE_DELAY` has passed since the job was observed
async fn settle(observed_at_millis: u64) {
    let elapsed = Duration::from_millis(now_millis().saturating_sub(observed_at_millis));
    if let Some(remaining) = SETTLE_DELAY.checked_sub(elapsed) {
        tokio::time::sleep(remaining).await;
    }
}

/// Subscribes to the notification channel and starts the worker loop
///
/// Each notification is handled in its own task, so a job waiting out its
/// delays does not hold up the next one. A closed channel is resubscribed,
/// and jobs queued while it was down are processed once it is back.
pub async fn start_port_verifier(
    mut shutdown_rx: watch::Receiver<bool>,
    verifier: Arc<PortVerifier>,
) -> Result<JoinHandle<()>, CacheError> {
    let mut notifications = verifier.store.subscribe(CHECK_PORT_CHANNEL).await?;
    tracing::info!("Starting port verifier on {}", CHECK_PORT_CHANNEL);

    Ok(tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                message = notifications.recv() => message,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Stopping port verifier");
                        break;
                    }
                    continue;
                }
            };

            if message.is_some() {
                spawn_check(&verifier);
                continue;
            }

            tracing::warn!("Notification channel {} closed, resubscribing", CHECK_PORT_CHANNEL);
            let Some(resubscribed) = resubscribe(verifier.store.as_ref(), &mut shutdown_rx).await
            else {
                tracing::info!("Stopping port verifier");
                break;
            };
            notifications = resubscribed;
            verifier.drain_backlog().await;
        }
    }))
}

/// First delay between resubscribe attempts
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(30);

fn spawn_check(verifier: &Arc<PortVerifier>) {
    let verifier = verifier.clone();
    tokio::spawn(async move {
        verifier.process_next().await;
    });
}

/// Retries the subscription with exponential backoff; `None` on shutdown
async fn resubscribe(
    store: &dyn KvStore,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Option<mpsc::Receiver<String>> {
    let mut backoff = RESUBSCRIBE_BACKOFF;
    loop {
        match store.subscribe(CHECK_PORT_CHANNEL).await {
            Ok(notifications) => {
                tracing::info!("Resubscribed on {}", CHECK_PORT_CHANNEL);
                return Some(notifications);
            }
            Err(e) => tracing::warn!(
                "Resubscribe on {} failed: {}, retrying in {}s",
                CHECK_PORT_CHANNEL,
                e,
                backoff.as_secs()
            ),
        }

        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return None;
                }
            }
        }
        backoff = (backoff * 2).min(MAX_RESUBSCRIBE_BACKOFF);
    }
}

impl PortVerifier {
    /// Starts one check per job already waiting in the queue; their
    /// notifications were lost while the channel was down
    async fn drain_backlog(self: &Arc<Self>) {
        match self.store.llen(CHECK_PORT_QUEUE).await {
            Ok(0) => {}
            Ok(pending) => {
                tracing::info!("Processing {} port checks queued while disconnected", pending);
                for _ in 0..pending {
                    spawn_check(self);
                }
            }
            Err(e) => tracing::warn!("Cannot read backlog of {}: {}", CHECK_PORT_QUEUE, e),
        }
    }
}
