// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::cache::{CHECK_PORT_QUEUE, KvStore, LeaseRecord, MemoryStore, VerificationJob, keys};
use crate::inventory::{InventorySnapshot, SnapshotInventory, WiringEntry};
use crate::testing::{CLIENT_MAC, ScriptedProbe, switch_info};

const BACKBONE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const EDGE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
const USER_IP: Ipv4Addr = Ipv4Addr::new(10, 1, 2, 10);
const GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 1, 0, 1);

struct Fixture {
    store: Arc<MemoryStore>,
    probe: Arc<ScriptedProbe>,
    engine: DhcpEngine,
}

fn inventory() -> SnapshotInventory {
    let snapshot: InventorySnapshot = serde_json::from_value(serde_json::json!({
        "wiring": [
            {"switch_ip": "10.0.0.5", "port": 7, "dorm": "A", "room": "101", "plug": "2"},
            {"switch_ip": "10.0.0.5", "port": 8, "dorm": "A", "room": "101", "plug": "3"}
        ],
        "addresses": [
            {"ip": "10.1.2.10", "dvo": "A101-2"},
            {"ip": "10.1.0.1", "dvo": "A-gateway"}
        ]
    }))
    .unwrap();
    SnapshotInventory::new(snapshot)
}

/// Writes what one topology cycle would, with the same 30 minute TTL
async fn seed_topology(store: &MemoryStore) {
    store
        .set_ex(
            &keys::switch_info(BACKBONE),
            &switch_info([10, 0, 0, 1], "GS2200-24").encode(),
            1800,
        )
        .await
        .unwrap();
    store
        .set_ex(
            &keys::topology(BACKBONE, 3),
            &switch_info([10, 0, 0, 5], "GS2200-24").encode(),
            1800,
        )
        .await
        .unwrap();
}

async fn fixture_with(config: EngineConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    seed_topology(&store).await;

    let probe = Arc::new(ScriptedProbe::new());
    probe.learn(EDGE, CLIENT_MAC, &[7]);

    let engine = DhcpEngine::new(store.clone(), probe.clone(), Arc::new(inventory()), config);
    Fixture {
        store,
        probe,
        engine,
    }
}

async fn fixture() -> Fixture {
    fixture_with(EngineConfig::default()).await
}

fn request(xid: u8, requested: Option<Ipv4Addr>) -> DhcpRequest {
    DhcpRequest {
        giaddr: BACKBONE,
        chaddr: CLIENT_MAC,
        xid: hex::encode([0, 0, 0, xid]),
        ciaddr: None,
        requested_ip: requested,
        option82: Some(vec![1, 3, 1, 3, 10]),
        subnet_mask: None,
        router: None,
    }
}

#[tokio::test]
async fn test_discover_resolves_live_lease() {
    let f = fixture().await;
    let resolution = f.engine.discover(&request(1, None)).await.unwrap();

    assert_eq!(resolution.source, LeaseSource::Live);
    assert_eq!(resolution.edge, Some(EDGE));
    assert_eq!(resolution.port, Some(7));
    assert_eq!(resolution.lease.yiaddr, USER_IP);
    assert_eq!(resolution.lease.router, GATEWAY);
    assert_eq!(resolution.lease.subnet_mask, Ipv4Addr::new(255, 255, 255, 0));
    assert_eq!(resolution.lease.server_identifier, Some(BACKBONE));

    let cached = f
        .store
        .get(&keys::mac_lease(EDGE, CLIENT_MAC))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(LeaseRecord::decode(&cached).unwrap().port, 7);
    let staged = f
        .store
        .get(&keys::staged_xid(CLIENT_MAC, "00000001"))
        .await
        .unwrap();
    assert_eq!(staged, Some(cached));
}

#[tokio::test]
async fn test_request_consumes_staged_lease_once() {
    let f = fixture().await;
    let offered = f.engine.discover(&request(1, None)).await.unwrap();

    let acked = f.engine.request(&request(1, Some(USER_IP))).await.unwrap();
    assert_eq!(acked.source, LeaseSource::Staged);
    assert_eq!(
        serde_json::to_string(&acked.lease).unwrap(),
        serde_json::to_string(&offered.lease).unwrap()
    );
    assert_eq!(f.probe.lookups().len(), 1);

    // staged entry is gone, so the same xid goes back to the switch
    let again = f.engine.request(&request(1, Some(USER_IP))).await.unwrap();
    assert_eq!(again.source, LeaseSource::Live);
    assert_eq!(f.probe.lookups().len(), 2);
}

#[tokio::test]
async fn test_request_queues_port_check() {
    let f = fixture().await;
    let mut notify = f.store.subscribe(crate::cache::CHECK_PORT_CHANNEL).await.unwrap();

    f.engine.request(&request(2, Some(USER_IP))).await.unwrap();

    let queued = f.store.lrange(CHECK_PORT_QUEUE).await.unwrap();
    assert_eq!(queued.len(), 1);
    let job = VerificationJob::decode(&queued[0]).unwrap();
    assert_eq!((job.edge, job.port, job.mac), (EDGE, 7, CLIENT_MAC));
    assert!(notify.recv().await.is_some());
}

#[tokio::test]
async fn test_request_rejects_other_requested_ip() {
    let f = fixture().await;
    f.engine.discover(&request(3, None)).await.unwrap();

    let err = f
        .engine
        .request(&request(3, Some(Ipv4Addr::new(10, 1, 2, 11))))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DhcpError::OptionMismatch {
            option: "requested ip",
            ..
        }
    ));
    assert_eq!(f.store.llen(CHECK_PORT_QUEUE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_request_rejects_declared_options_that_disagree() {
    let f = fixture().await;

    let mut wrong_mask = request(4, Some(USER_IP));
    wrong_mask.subnet_mask = Some(Ipv4Addr::new(255, 255, 0, 0));
    assert!(matches!(
        f.engine.request(&wrong_mask).await,
        Err(DhcpError::OptionMismatch {
            option: "subnet mask",
            ..
        })
    ));

    let mut extra_router = request(5, Some(USER_IP));
    extra_router.router = Some(vec![GATEWAY, Ipv4Addr::new(10, 1, 0, 2)]);
    assert!(matches!(
        f.engine.request(&extra_router).await,
        Err(DhcpError::OptionMismatch {
            option: "router",
            ..
        })
    ));

    let mut stale_ciaddr = request(6, Some(USER_IP));
    stale_ciaddr.ciaddr = Some(Ipv4Addr::new(10, 1, 9, 9));
    assert!(matches!(
        f.engine.request(&stale_ciaddr).await,
        Err(DhcpError::OptionMismatch {
            option: "ciaddr",
            ..
        })
    ));

    let mut matching = request(7, Some(USER_IP));
    matching.subnet_mask = Some(Ipv4Addr::new(255, 255, 255, 0));
    matching.router = Some(vec![GATEWAY]);
    matching.ciaddr = Some(USER_IP);
    assert!(f.engine.request(&matching).await.is_ok());
}

#[tokio::test]
async fn test_discover_falls_back_to_cached_lease() {
    let f = fixture().await;
    f.engine.discover(&request(8, None)).await.unwrap();

    f.probe.unreachable(EDGE);
    let resolution = f.engine.discover(&request(9, None)).await.unwrap();
    assert_eq!(resolution.source, LeaseSource::Cached);
    assert_eq!(resolution.lease.yiaddr, USER_IP);

    let staged = f.engine.request(&request(9, Some(USER_IP))).await.unwrap();
    assert_eq!(staged.source, LeaseSource::Staged);
}

#[tokio::test]
async fn test_fake_leases_are_rate_limited() {
    let f = fixture().await;
    let mut unknown = request(0, None);
    unknown.option82 = Some(vec![1, 3, 1, 4, 10]);

    for xid in 1..=10u8 {
        unknown.xid = hex::encode([0, 0, 0, xid]);
        let resolution = f.engine.discover(&unknown).await.unwrap();
        assert_eq!(resolution.source, LeaseSource::Fake);
        assert!(f.engine.policy().is_fake(resolution.lease.yiaddr));
    }

    unknown.xid = hex::encode([0, 0, 0, 11]);
    assert!(matches!(
        f.engine.discover(&unknown).await,
        Err(DhcpError::RateLimited { pending: 10, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_staged_lease_expires_after_five_minutes() {
    let f = fixture().await;
    f.engine.discover(&request(20, None)).await.unwrap();

    tokio::time::advance(Duration::from_secs(301)).await;
    let acked = f.engine.request(&request(20, Some(USER_IP))).await.unwrap();
    assert_eq!(acked.source, LeaseSource::Live);
    assert_eq!(acked.lease.yiaddr, USER_IP);
    assert_eq!(f.probe.lookups().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fake_lease_budget_recovers_after_an_hour() {
    let f = fixture().await;
    let mut unknown = request(0, None);
    unknown.option82 = Some(vec![1, 3, 1, 4, 10]);

    for xid in 1..=10u8 {
        unknown.xid = hex::encode([0, 0, 0, xid]);
        let resolution = f.engine.discover(&unknown).await.unwrap();
        assert_eq!(resolution.source, LeaseSource::Fake);
    }

    tokio::time::advance(Duration::from_secs(3599)).await;
    seed_topology(&f.store).await;
    unknown.xid = hex::encode([0, 0, 0, 11]);
    assert!(matches!(
        f.engine.discover(&unknown).await,
        Err(DhcpError::RateLimited { pending: 10, .. })
    ));

    tokio::time::advance(Duration::from_secs(2)).await;
    seed_topology(&f.store).await;
    let resolution = f.engine.discover(&unknown).await.unwrap();
    assert_eq!(resolution.source, LeaseSource::Fake);
    assert_eq!(f.store.llen(&keys::fake_pending(CLIENT_MAC)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_fake_request_requires_granted_xid() {
    let f = fixture().await;
    f.probe.learn(EDGE, CLIENT_MAC, &[]);
    let fake_ip = f.engine.policy().fake.ip;

    let offered = f.engine.discover(&request(12, None)).await.unwrap();
    assert_eq!(offered.source, LeaseSource::Fake);

    let acked = f.engine.request(&request(12, Some(fake_ip))).await.unwrap();
    assert_eq!(acked.lease, offered.lease);
    assert_eq!((acked.edge, acked.port), (Some(EDGE), Some(0)));
    let job = VerificationJob::decode(&f.store.lpop(CHECK_PORT_QUEUE).await.unwrap().unwrap())
        .unwrap();
    assert_eq!(job.port, 0);

    assert!(matches!(
        f.engine.request(&request(12, Some(fake_ip))).await,
        Err(DhcpError::XidNotMatched { .. })
    ));
    assert!(matches!(
        f.engine.request(&request(13, Some(fake_ip))).await,
        Err(DhcpError::XidNotMatched { .. })
    ));
}

#[tokio::test]
async fn test_missing_relay_data_is_not_found() {
    let f = fixture().await;

    let mut no_relay = request(14, None);
    no_relay.giaddr = Ipv4Addr::UNSPECIFIED;
    assert!(matches!(
        f.engine.discover(&no_relay).await,
        Err(DhcpError::NotFound("giaddr"))
    ));

    let mut no_option82 = request(14, Some(USER_IP));
    no_option82.option82 = None;
    assert!(matches!(
        f.engine.request(&no_option82).await,
        Err(DhcpError::NotFound("option 82"))
    ));

    assert!(matches!(
        f.engine.request(&request(14, None)).await,
        Err(DhcpError::NotFound("requested ip"))
    ));
}

#[tokio::test]
async fn test_request_without_staged_lease_surfaces_lookup_errors() {
    let f = fixture().await;

    f.probe.learn(EDGE, CLIENT_MAC, &[]);
    assert!(matches!(
        f.engine.request(&request(15, Some(USER_IP))).await,
        Err(DhcpError::SnmpNotFound { switch: EDGE, .. })
    ));

    f.probe.learn(EDGE, CLIENT_MAC, &[8]);
    // port 8 is wired but has no address row
    assert!(matches!(
        f.engine.request(&request(16, Some(USER_IP))).await,
        Err(DhcpError::UserIpNotFound { port: 8, .. })
    ));

    f.store
        .set_ex(
            &keys::switch_info(BACKBONE),
            &switch_info([10, 0, 0, 1], "Catalyst 2960").encode(),
            1800,
        )
        .await
        .unwrap();
    assert!(matches!(
        f.engine.request(&request(17, Some(USER_IP))).await,
        Err(DhcpError::VendorUnrecognized { .. })
    ));
}

#[tokio::test]
async fn test_decisions_are_published_when_enabled() {
    let f = fixture_with(EngineConfig {
        publish_events: true,
        ..EngineConfig::default()
    })
    .await;
    let mut events = f.store.subscribe(crate::cache::DHCP_EVENTS_CHANNEL).await.unwrap();

    f.engine.discover(&request(18, None)).await.unwrap();
    let event: serde_json::Value = serde_json::from_str(&events.recv().await.unwrap()).unwrap();
    assert_eq!(event["type"], "discover");
    assert_eq!(event["xid"], "00000012");
    assert_eq!(event["chaddr"], "aabbccddeeff");
    assert_eq!(event["yiaddr"], "10.1.2.10");
    assert_eq!(event["port"], 7);
    assert_eq!(event["fake"], false);
}

#[tokio::test(start_paused = true)]
async fn test_mac_lease_cache_expires_after_ten_leases() {
    let f = fixture().await;
    f.engine.discover(&request(19, None)).await.unwrap();
    let key = keys::mac_lease(EDGE, CLIENT_MAC);

    tokio::time::advance(Duration::from_secs(35_999)).await;
    assert!(f.store.get(&key).await.unwrap().is_some());
    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(f.store.get(&key).await.unwrap().is_none());
}
