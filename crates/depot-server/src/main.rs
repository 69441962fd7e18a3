//! Depot Server - Main entry point

use anyhow::{Context, Result};
use depot_common::logging::{init_logging, LogConfig};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use depot_server::{
    auth::StoreIdentity,
    config::Config,
    db, features, maintenance,
    snapshots::{start_scheduler, SnapshotRunner, ZfsCli},
    state::AppState,
    tls,
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::from_env("depot-server")?;
    let _log_guard = init_logging(&log_config)?;

    info!("Starting depot server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        tls = config.server.tls_enabled(),
        "configuration loaded"
    );

    // The data directory holds the metadata database and in-flight chunks;
    // it must exist before anything opens a file in it.
    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create data dir {}",
                config.storage.data_dir.display()
            )
        })?;

    let db_pool = db::connect(
        &config.storage.database_path(),
        config.database.max_connections,
    )
    .await
    .context("failed to open metadata database")?;
    info!("metadata database opened");

    db::migrate(&db_pool).await.context("migrations failed")?;
    info!("database migrations completed");

    if config.auth.use_pam {
        // The PAM provider is an external collaborator wired in at
        // deployment; the store-backed provider covers everything else.
        info!("USE_PAM is set; using store-backed identity provider with host-style provisioning");
    }
    let identity = Arc::new(StoreIdentity::new(db_pool.clone()));

    let snapshots = Arc::new(SnapshotRunner::new(db_pool.clone(), Arc::new(ZfsCli::new())));

    let config = Arc::new(config);
    let state = AppState::new(db_pool, config.clone(), identity, snapshots.clone());

    state
        .uploads
        .init()
        .await
        .map_err(|e| anyhow::anyhow!("failed to prepare upload directory: {e}"))?;

    let _sweeper = maintenance::start_sweeper(state.clone());
    let _scheduler = start_scheduler(snapshots);

    let app = features::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid HOST/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("server listening on {addr}");

    // A signal flips the token; the drain phase that follows is bounded by
    // the configured deadline. In-flight chunk uploads are not aborted by
    // shutdown; their sessions stay resumable.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            shutdown.cancel();
        });
    }
    let drain_deadline = Duration::from_secs(config.server.shutdown_timeout_secs);

    match (&config.server.tls_cert, &config.server.tls_key) {
        (Some(cert), Some(key)) => {
            let tls_config = tls::load_server_config(cert, key)?;
            tls::serve(listener, app, tls_config, shutdown, drain_deadline).await?;
        },
        _ => {
            let graceful = {
                let shutdown = shutdown.clone();
                async move { shutdown.cancelled().await }
            };
            let mut server = std::pin::pin!(axum::serve(listener, app)
                .with_graceful_shutdown(graceful)
                .into_future());

            tokio::select! {
                result = &mut server => result?,
                _ = shutdown.cancelled() => {
                    info!(
                        timeout_secs = drain_deadline.as_secs(),
                        "shutdown requested, draining in-flight requests"
                    );
                    match tokio::time::timeout(drain_deadline, &mut server).await {
                        Ok(result) => result?,
                        Err(_) => tracing::warn!("drain deadline exceeded, forcing exit"),
                    }
                },
            }
        },
    }

    info!("server shut down gracefully");

    Ok(())
}

/// Resolve when a shutdown signal (Ctrl+C or SIGTERM) arrives.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C");
        },
        _ = terminate => {
            info!("received SIGTERM");
        },
    }
}
