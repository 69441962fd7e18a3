//! Optional TLS termination
//!
//! When `TLS_CERT` and `TLS_KEY` are configured the listener terminates TLS
//! itself; otherwise the caller serves plain HTTP. The accept loop hands
//! each handshaken stream to hyper with the axum router as the service.
//! On shutdown the loop stops accepting, then waits for the tracked
//! connection tasks to finish, bounded by the drain deadline; connections
//! still open past the deadline are aborted.

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::service::TowerToHyperService;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

/// Load certificate chain + private key into a rustls server config.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<rustls::ServerConfig> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(
        std::fs::File::open(cert_path)
            .with_context(|| format!("cannot open TLS_CERT {}", cert_path.display()))?,
    ))
    .collect::<std::result::Result<Vec<_>, _>>()
    .context("invalid certificate PEM")?;

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(
        std::fs::File::open(key_path)
            .with_context(|| format!("cannot open TLS_KEY {}", key_path.display()))?,
    ))
    .context("invalid key PEM")?
    .context("no private key found in TLS_KEY")?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("certificate/key mismatch")?;

    Ok(config)
}

/// Serve the router over TLS until `shutdown` fires, then drain in-flight
/// connections within `drain_deadline`.
pub async fn serve(
    listener: TcpListener,
    app: axum::Router,
    tls_config: rustls::ServerConfig,
    shutdown: CancellationToken,
    drain_deadline: Duration,
) -> Result<()> {
    let acceptor = TlsAcceptor::from(Arc::new(tls_config));
    let service = TowerToHyperService::new(app);
    let mut connections: JoinSet<()> = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => break,
        };

        // reap tasks for connections that already closed
        while connections.try_join_next().is_some() {}

        let acceptor = acceptor.clone();
        let service = service.clone();

        connections.spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!(peer = %peer, error = %e, "TLS handshake failed");
                    return;
                },
            };

            if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(peer = %peer, error = %e, "connection error");
            }
        });
    }

    // stop accepting, then drain
    drop(listener);

    if connections.is_empty() {
        return Ok(());
    }

    tracing::info!(
        connections = connections.len(),
        timeout_secs = drain_deadline.as_secs(),
        "shutdown requested, draining TLS connections"
    );

    let drained = tokio::time::timeout(drain_deadline, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            connections = connections.len(),
            "drain deadline exceeded, aborting remaining TLS connections"
        );
        connections.abort_all();
    }

    Ok(())
}
