use std::net::SocketAddr;
use std::sync::Arc;

use dormnet_dhcp::cache::{KvStore, RedisStore};
use dormnet_dhcp::dhcp::DhcpEngine;
use dormnet_dhcp::inventory::{Inventory, SnapshotInventory};
use dormnet_dhcp::snmp::{SnmpProbe, SwitchProbe};
use dormnet_dhcp::{
    AppError, AppState, Config, MetricsRegistry, PortVerifier, Result, TopologyBuilder,
    create_router, start_port_verifier, start_topology_builder,
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let config = Config::from_env();
    config.validate().map_err(AppError::Config)?;
    tracing::info!(
        "Roles: http={} topology_builder={} port_verifier={}",
        config.enable_http,
        config.enable_topology_builder,
        config.enable_port_verifier
    );

    let store: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
    let probe: Arc<dyn SwitchProbe> = Arc::new(SnmpProbe::new());
    let inventory: Arc<dyn Inventory> = Arc::new(SnapshotInventory::load(&config.inventory_path)?);
    let metrics = MetricsRegistry::new();

    // Graceful shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut tasks = Vec::new();
    if config.enable_topology_builder {
        let builder = Arc::new(TopologyBuilder::new(
            store.clone(),
            probe.clone(),
            inventory.clone(),
            metrics.clone(),
        ));
        tasks.push(start_topology_builder(
            shutdown_rx.clone(),
            builder,
            config.topology_interval(),
        ));
    }
    if config.enable_port_verifier {
        let verifier = Arc::new(PortVerifier::new(
            store.clone(),
            probe.clone(),
            metrics.clone(),
        ));
        tasks.push(start_port_verifier(shutdown_rx.clone(), verifier).await?);
    }

    if config.enable_http {
        let engine = DhcpEngine::new(
            store.clone(),
            probe.clone(),
            inventory.clone(),
            config.engine_config(),
        );
        let state = Arc::new(AppState {
            config: config.clone(),
            metrics,
            engine,
            inventory,
            probe,
        });
        serve(&config, state, shutdown_rx.clone()).await?;
    } else {
        let mut shutdown_rx = shutdown_rx.clone();
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }
    }

    for task in tasks {
        let _ = task.await;
    }
    tracing::info!("Stopped");
    Ok(())
}

async fn serve(
    config: &Config,
    state: Arc<AppState>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = config.server_addr.parse().map_err(|e| {
        tracing::error!("Invalid server address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind address: {}", e);
        e
    })?;

    tracing::info!("DHCP control plane listening on {}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  - GET  /health               - Health check");
    tracing::info!("  - GET  /metrics              - Prometheus metrics");
    tracing::info!("  - POST /discover             - DHCP DISCOVER");
    tracing::info!("  - POST /request              - DHCP REQUEST");
    tracing::info!("  - GET  /switches/{{ip}}/ports - Switch port diagnostics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("HTTP server shutting down");
        })
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            e
        })?;

    Ok(())
}

fn setup_tracing() {
    // RUST_LOG wins; "info" otherwise
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
