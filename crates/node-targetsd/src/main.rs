//! node-targetsd - cluster node scrape target daemon
//!
//! Lists the cluster's nodes, writes them as scrape targets, then follows
//! the node watch stream and rewrites the file on every membership change.

use clap::Parser;
use node_targets_client::HttpClusterApi;
use node_targetsd::{BackoffPolicy, Config, LogFormat, Supervisor, TargetFileWriter};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration
    let config = Config::parse();

    // Initialize logging
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "node_targetsd={level},node_targets_client={level}",
            level = default_level
        ))
    });
    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .init();

    info!(
        "node-targetsd v{} - cluster node scrape targets",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Master: {}", config.master);
    info!("Nodes file: {}", config.nodes_file.display());
    info!("Node read-only port: {}", config.node_read_only_port);

    let api = match HttpClusterApi::new(&config.client_config()) {
        Ok(api) => api,
        Err(e) => {
            error!("Failed to initialize cluster client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let writer = TargetFileWriter::new(&config.nodes_file, config.node_read_only_port);
    let policy = BackoffPolicy {
        initial_delay: config.initial_backoff(),
        max_delay: config.max_backoff(),
        max_failures: config.max_resync_attempts,
        ..BackoffPolicy::default()
    };
    let mut supervisor = Supervisor::new(Arc::new(api), writer, policy)
        .with_watch_idle_timeout(config.watch_idle_timeout());

    // Install signal handlers
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    match supervisor.run(shutdown_rx).await {
        Ok(()) => {
            let stats = supervisor.stats();
            info!(
                resyncs = stats.resyncs,
                events = stats.events_applied,
                writes = stats.writes,
                "Shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Supervisor error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.ok();
}
