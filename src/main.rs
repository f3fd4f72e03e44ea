//! HTLC Monitor - Entry Point
//!
//! Initializes configuration, logging, the snapshot store and the chain
//! collectors, then runs the poller and the HTTP server until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from HTLC_MONITOR_CONFIG) + env overrides + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open the snapshot store (storage.db_folder, or memory when ephemeral)
//! 4. Create the Archethic client + collector
//! 5. Connect every EVM chain + create the EVM collector
//! 6. Create metrics holder, self-metrics, poller and swap board service
//! 7. Spawn the HTTP server (/metrics, /htlcs, /internal/metrics, /live, /ready)
//! 8. Spawn the poller (one immediate tick, then per cron fire time)
//! 9. Wait for SIGINT, broadcast shutdown, join tasks with timeouts

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use htlc_monitor::adapters::archethic::{ArchethicClient, ArchethicClientConfig, ArchethicCollector};
use htlc_monitor::adapters::evm::EvmCollector;
use htlc_monitor::adapters::http::{AppState, HttpServer};
use htlc_monitor::adapters::metrics::ServiceMetrics;
use htlc_monitor::adapters::persistence::{JsonFileStore, MemoryStore};
use htlc_monitor::config;
use htlc_monitor::domain::reconcile::{Reconciler, RetiredChains};
use htlc_monitor::ports::collector::HtlcCollector;
use htlc_monitor::ports::store::SnapshotStore;
use htlc_monitor::ports::telemetry::Telemetry;
use htlc_monitor::usecases::{Aggregator, MetricsHolder, Poller, SwapBoardService, TickSchedule};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = config::loader::config_path_from_env();
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        cron = %config.schedule.cron,
        "Starting HTLC monitor"
    );

    let schedule = TickSchedule::parse(&config.schedule.cron)?;

    // ── 3. Open the snapshot store ──────────────────────────
    let store: Arc<dyn SnapshotStore> = if config.storage.ephemeral {
        warn!("Ephemeral storage: discovery cursors and cached HTLCs are lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            JsonFileStore::open(&config.storage.db_folder)
                .await
                .context("Failed to open snapshot store")?,
        )
    };

    // ── 4. Archethic client + collector ─────────────────────
    let archethic_client = Arc::new(
        ArchethicClient::new(ArchethicClientConfig::from_config(&config.archethic))
            .context("Failed to create Archethic client")?,
    );
    let archethic: Arc<dyn HtlcCollector> = Arc::new(ArchethicCollector::new(
        Arc::clone(&archethic_client),
        Arc::clone(&store),
        config.archethic.pools.clone(),
    ));

    // ── 5. EVM chains + collector ───────────────────────────
    let evm_collector = EvmCollector::connect(&config.evm.chains, &store)
        .await
        .context("Failed to connect EVM chains")?;
    info!(chains = ?evm_collector.chain_ids(), "EVM chains connected");
    let evm: Arc<dyn HtlcCollector> = Arc::new(evm_collector);

    // ── 6. Use cases ────────────────────────────────────────
    let holder = Arc::new(MetricsHolder::new());
    let service_metrics = Arc::new(ServiceMetrics::new().context("Failed to create service metrics")?);
    let telemetry: Arc<dyn Telemetry> = service_metrics.clone();

    let poller = Poller::new(
        Arc::clone(&archethic),
        Arc::clone(&evm),
        Aggregator::new(Arc::clone(&holder)),
        Arc::clone(&telemetry),
    );

    let reconciler = Reconciler::new(RetiredChains::new(
        config.reconciliation.retired_chain_ids.iter().copied(),
    ));
    let swap_board = Arc::new(SwapBoardService::new(
        Arc::clone(&archethic),
        Arc::clone(&evm),
        reconciler,
        telemetry,
    ));

    // ── Shutdown signal channel ─────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 7. Spawn HTTP server ────────────────────────────────
    let state = AppState {
        holder: Arc::clone(&holder),
        swap_board,
        metrics: Arc::clone(&service_metrics),
        explorer: Arc::from(config.archethic.endpoint.trim_end_matches('/')),
    };
    let bind_address = format!("{}:{}", config.service.host, config.service.port);
    let server = HttpServer::new(state, bind_address);
    let server_shutdown = shutdown_tx.subscribe();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(server_shutdown).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    // ── 8. Spawn poller ─────────────────────────────────────
    let poller_shutdown = shutdown_tx.subscribe();
    let poller_handle = tokio::spawn(async move {
        if let Err(e) = poller.run(schedule, poller_shutdown).await {
            error!(error = %e, "Poller failed");
        }
    });

    info!("All tasks spawned, monitor is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    match signal::ctrl_c().await {
        Ok(()) => info!("SIGINT received, initiating graceful shutdown"),
        Err(e) => error!(error = %e, "Failed to listen for SIGINT, shutting down"),
    }

    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // A tick in flight is allowed to finish (up to 30s)
    if tokio::time::timeout(Duration::from_secs(30), poller_handle)
        .await
        .is_err()
    {
        warn!("Poller did not stop within 30s");
    }

    if tokio::time::timeout(Duration::from_secs(5), server_handle)
        .await
        .is_err()
    {
        warn!("HTTP server did not stop within 5s");
    }

    info!("Shutdown complete");
    Ok(())
}
