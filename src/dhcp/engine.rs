// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! DISCOVER / REQUEST resolution
//!
//! Lease sources are tried in order: live lookup on the edge switch, the
//! per-MAC lease cache, then a rate-limited fake lease. REQUEST prefers the
//! lease staged by the matching DISCOVER and re-runs the live lookup when
//! nothing is staged.

use std::net::Ipv4Addr;
use std::sync::Arc;

use super::events::{DhcpEvent, MessageKind};
use super::{DhcpError, DhcpRequest, Lease, LeasePolicy};
use crate::cache::{
    CHECK_PORT_CHANNEL, CHECK_PORT_QUEUE, DHCP_EVENTS_CHANNEL, FAKE_LEASE_LIMIT,
    FAKE_PENDING_TTL_SECS, KvStore, LeaseRecord, STAGED_XID_TTL_SECS, SwitchInfo,
    VerificationJob, keys,
};
use crate::inventory::Inventory;
use crate::option82::VendorRegistry;
use crate::snmp::SwitchProbe;

/// Engine settings
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub policy: LeasePolicy,
    /// Publish every decision on the `dhcp` channel
    pub publish_events: bool,
}

/// Where a lease came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseSource {
    /// Resolved on the edge switch just now
    Live,
    /// Reused from the per-MAC lease cache
    Cached,
    /// Staged by the DISCOVER with the same xid
    Staged,
    /// Sentinel lease
    Fake,
}

impl LeaseSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Staged => "staged",
            Self::Fake => "fake",
        }
    }
}

/// Successful answer to a DISCOVER or REQUEST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub lease: Lease,
    pub source: LeaseSource,
    pub edge: Option<Ipv4Addr>,
    pub port: Option<u32>,
}

impl Resolution {
    fn from_record(record: LeaseRecord, source: LeaseSource) -> Self {
        Self {
            lease: record.lease,
            source,
            edge: Some(record.edge),
            port: Some(record.port),
        }
    }
}

/// DHCP resolution engine
///
/// Holds no request state of its own; everything that must survive between
/// DISCOVER and REQUEST lives in the shared store.
#[derive(Clone)]
pub struct DhcpEngine {
    store: Arc<dyn KvStore>,
    probe: Arc<dyn SwitchProbe>,
    inventory: Arc<dyn Inventory>,
    vendors: Arc<VendorRegistry>,
    config: Arc<EngineConfig>,
}

impl DhcpEngine {
    pub fn new(
        store: Arc<dyn KvStore>,
        probe: Arc<dyn SwitchProbe>,
        inventory: Arc<dyn Inventory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            probe,
            inventory,
            vendors: Arc::new(VendorRegistry::default()),
            config: Arc::new(config),
        }
    }

    /// Replaces the built-in option 82 rules
    #[must_use]
    pub fn with_vendors(mut self, vendors: VendorRegistry) -> Self {
        self.vendors = Arc::new(vendors);
        self
    }

    #[must_use]
    pub fn policy(&self) -> &LeasePolicy {
        &self.config.policy
    }

    pub async fn discover(&self, request: &DhcpRequest) -> Result<Resolution, DhcpError> {
        let result = self.handle_discover(request).await;
        self.publish_event(MessageKind::Discover, request, &result)
            .await;
        result
    }

    pub async fn request(&self, request: &DhcpRequest) -> Result<Resolution, DhcpError> {
        let result = self.handle_request(request).await;
        self.publish_event(MessageKind::Request, request, &result)
            .await;
        result
    }

    async fn handle_discover(&self, request: &DhcpRequest) -> Result<Resolution, DhcpError> {
        let giaddr = request.relay()?;
        request.relay_agent_info()?;

        let edge = match self.resolve_edge(request).await {
            Ok(edge) => edge,
            Err(e) if e.is_fallback() => {
                tracing::info!(chaddr = %request.chaddr, xid = %request.xid, "Edge unresolved: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(edge) = &edge {
            match self.resolve_live(request, edge).await {
                Ok(record) => {
                    self.stage_xid(request, &record).await?;
                    return Ok(Resolution::from_record(record, LeaseSource::Live));
                }
                Err(e) if e.is_fallback() => {
                    tracing::info!(
                        chaddr = %request.chaddr,
                        edge = %edge.ip,
                        "Live resolution failed, trying lease cache: {}",
                        e
                    );
                }
                Err(e) => return Err(e),
            }

            if let Some(record) = self.cached_lease(edge, request).await? {
                tracing::debug!(chaddr = %request.chaddr, edge = %edge.ip, "Reusing cached lease");
                self.stage_xid(request, &record).await?;
                return Ok(Resolution::from_record(record, LeaseSource::Cached));
            }
        }

        self.grant_fake(request, giaddr).await
    }

    async fn handle_request(&self, request: &DhcpRequest) -> Result<Resolution, DhcpError> {
        let giaddr = request.relay()?;
        let requested = request
            .requested_ip
            .ok_or(DhcpError::NotFound("requested ip"))?;
        request.relay_agent_info()?;

        if self.config.policy.is_fake(requested) {
            return self.confirm_fake(request, giaddr).await;
        }

        let resolution = match self.take_staged(request).await? {
            Some(record) => Resolution::from_record(record, LeaseSource::Staged),
            None => {
                tracing::debug!(chaddr = %request.chaddr, xid = %request.xid, "No staged lease");
                let edge = self
                    .resolve_edge(request)
                    .await?
                    .ok_or(DhcpError::NotFound("topology entry"))?;
                let record = self.resolve_live(request, &edge).await?;
                Resolution::from_record(record, LeaseSource::Live)
            }
        };

        check_consistency(request, requested, &resolution.lease)?;

        if let (Some(edge), Some(port)) = (resolution.edge, resolution.port) {
            self.enqueue(VerificationJob::observed_now(edge, port, request.chaddr))
                .await;
        }
        Ok(resolution)
    }

    /// Relay switch identity, then option 82, then the topology entry for
    /// the relay port; `Ok(None)` is a topology miss
    async fn resolve_edge(&self, request: &DhcpRequest) -> Result<Option<SwitchInfo>, DhcpError> {
        let giaddr = request.relay()?;
        let raw = request.relay_agent_info()?;

        let relay = self
            .switch_info(&keys::switch_info(giaddr))
            .await?
            .ok_or(DhcpError::NotFound("relay switch info"))?;
        let info = self
            .vendors
            .decode(&relay.name, raw)?
            .ok_or_else(|| DhcpError::VendorUnrecognized {
                model: relay.name.clone(),
            })?;

        let edge = self
            .switch_info(&keys::topology(giaddr, info.port))
            .await?;
        if edge.is_none() {
            tracing::debug!("Topology miss for {}:{}", giaddr, info.port);
        }
        Ok(edge)
    }

    async fn switch_info(&self, key: &str) -> Result<Option<SwitchInfo>, DhcpError> {
        match self.store.get(key).await? {
            Some(value) => Ok(Some(SwitchInfo::decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Finds the MAC on the edge switch and maps the port to the jack's
    /// address; the result is written to the MAC lease cache
    async fn resolve_live(
        &self,
        request: &DhcpRequest,
        edge: &SwitchInfo,
    ) -> Result<LeaseRecord, DhcpError> {
        let port = self
            .probe
            .find_mac_port(edge.ip, &edge.community, request.chaddr)
            .await?;
        let user = self.inventory.find_user_ip(edge.ip, port).await?;

        let policy = &self.config.policy;
        let record = LeaseRecord {
            edge: edge.ip,
            port,
            lease: policy.lease(user.ip, user.gateway, edge.mask, request.giaddr),
        };
        self.store
            .set_ex(
                &keys::mac_lease(edge.ip, request.chaddr),
                &record.encode()?,
                policy.mac_lease_ttl(),
            )
            .await?;
        tracing::info!(
            chaddr = %request.chaddr,
            edge = %edge.ip,
            port,
            "Resolved {}",
            record.lease.yiaddr
        );
        Ok(record)
    }

    async fn cached_lease(
        &self,
        edge: &SwitchInfo,
        request: &DhcpRequest,
    ) -> Result<Option<LeaseRecord>, DhcpError> {
        match self
            .store
            .get(&keys::mac_lease(edge.ip, request.chaddr))
            .await?
        {
            Some(value) => Ok(Some(LeaseRecord::decode(&value)?)),
            None => Ok(None),
        }
    }

    async fn stage_xid(&self, request: &DhcpRequest, record: &LeaseRecord) -> Result<(), DhcpError> {
        self.store
            .set_ex(
                &keys::staged_xid(request.chaddr, &request.xid),
                &record.encode()?,
                STAGED_XID_TTL_SECS,
            )
            .await?;
        Ok(())
    }

    /// Consumes the staged lease; a second call with the same xid misses
    async fn take_staged(&self, request: &DhcpRequest) -> Result<Option<LeaseRecord>, DhcpError> {
        match self
            .store
            .take(&keys::staged_xid(request.chaddr, &request.xid))
            .await?
        {
            Some(value) => Ok(Some(LeaseRecord::decode(&value)?)),
            None => Ok(None),
        }
    }

    async fn grant_fake(
        &self,
        request: &DhcpRequest,
        giaddr: Ipv4Addr,
    ) -> Result<Resolution, DhcpError> {
        let key = keys::fake_pending(request.chaddr);
        let pending = self.store.llen(&key).await?;
        if pending >= FAKE_LEASE_LIMIT {
            return Err(DhcpError::RateLimited {
                chaddr: request.chaddr,
                pending,
            });
        }

        self.store
            .push_with_ttl(&key, &request.xid, FAKE_PENDING_TTL_SECS)
            .await?;
        tracing::warn!(chaddr = %request.chaddr, xid = %request.xid, "Granting fake lease");
        Ok(Resolution {
            lease: self.config.policy.fake_lease(giaddr),
            source: LeaseSource::Fake,
            edge: None,
            port: None,
        })
    }

    /// Accepts a REQUEST for the fake lease only for an xid that was granted
    /// one; the xid is removed so it cannot be replayed
    async fn confirm_fake(
        &self,
        request: &DhcpRequest,
        giaddr: Ipv4Addr,
    ) -> Result<Resolution, DhcpError> {
        let granted = self
            .store
            .lrem(&keys::fake_pending(request.chaddr), &request.xid)
            .await?;
        if !granted {
            return Err(DhcpError::XidNotMatched {
                xid: request.xid.clone(),
            });
        }

        let edge = match self.resolve_edge(request).await {
            Ok(edge) => edge.map(|info| info.ip),
            Err(e) => {
                tracing::debug!(chaddr = %request.chaddr, "Fake lease without edge: {}", e);
                None
            }
        };
        // port 0 never matches, so the verifier bounces wherever the MAC shows up
        if let Some(edge) = edge {
            self.enqueue(VerificationJob::observed_now(edge, 0, request.chaddr))
                .await;
        }

        Ok(Resolution {
            lease: self.config.policy.fake_lease(giaddr),
            source: LeaseSource::Fake,
            edge,
            port: edge.map(|_| 0),
        })
    }

    /// Queues a port check and wakes one verifier; the lease is already
    /// decided, so failures are only logged
    async fn enqueue(&self, job: VerificationJob) {
        let queued = async {
            self.store.push(CHECK_PORT_QUEUE, &job.encode()).await?;
            self.store.publish(CHECK_PORT_CHANNEL, "").await
        };
        match queued.await {
            Ok(()) => tracing::debug!("Queued port check for {}", job),
            Err(e) => tracing::warn!("Failed to queue port check for {}: {}", job, e),
        }
    }

    async fn publish_event(
        &self,
        kind: MessageKind,
        request: &DhcpRequest,
        result: &Result<Resolution, DhcpError>,
    ) {
        if !self.config.publish_events {
            return;
        }

        let event = DhcpEvent::new(kind, request);
        let event = match result {
            Ok(resolution) => event
                .with_lease(&resolution.lease, resolution.source == LeaseSource::Fake)
                .with_location(resolution.edge, resolution.port),
            Err(e) => event.with_error(e),
        };
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode DHCP event: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.publish(DHCP_EVENTS_CHANNEL, &payload).await {
            tracing::warn!("Failed to publish DHCP event: {}", e);
        }
    }
}

fn mismatch(option: &'static str, resolved: Ipv4Addr, declared: impl ToString) -> DhcpError {
    DhcpError::OptionMismatch {
        option,
        resolved,
        declared: declared.to_string(),
    }
}

/// Client-declared values must agree with the resolved lease; nothing is
/// corrected on the client's behalf
fn check_consistency(
    request: &DhcpRequest,
    requested: Ipv4Addr,
    lease: &Lease,
) -> Result<(), DhcpError> {
    if let Some(ciaddr) = request.ciaddr.filter(|ip| *ip != lease.yiaddr) {
        return Err(mismatch("ciaddr", lease.yiaddr, ciaddr));
    }
    if requested != lease.yiaddr {
        return Err(mismatch("requested ip", lease.yiaddr, requested));
    }
    if let Some(mask) = request.subnet_mask.filter(|mask| *mask != lease.subnet_mask) {
        return Err(mismatch("subnet mask", lease.subnet_mask, mask));
    }
    if let Some(routers) = request
        .router
        .as_ref()
        .filter(|routers| routers.as_slice() != [lease.router])
    {
        let declared: Vec<String> = routers.iter().map(Ipv4Addr::to_string).collect();
        return Err(mismatch("router", lease.router, declared.join(",")));
    }
    Ok(())
}
