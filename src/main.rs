// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{error::Error, net::SocketAddr, sync::Arc, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use marketplace_auth::{
    api::router,
    auth::{AuthenticatorRegistry, HttpKeySetFetcher, RequestGate},
    config::{LogFormat, Settings, DEFAULT_LOG_FILTER},
    state::AppState,
    store::InMemoryStore,
};

/// Grace period for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    let settings = Settings::from_env()?;
    init_tracing(settings.log_format);

    let fetcher = Arc::new(HttpKeySetFetcher::new(settings.key_source.fetch_timeout)?);
    let registry =
        AuthenticatorRegistry::from_config(&settings.issuers, &settings.key_source, fetcher)?;
    if registry.is_empty() {
        warn!("No token issuers configured; every request will be anonymous");
    }

    // Prime key caches so the first requests do not pay for discovery.
    for (name, source) in registry.key_sources() {
        match source.warm().await {
            Ok(()) => info!(issuer = %name, "Signing keys loaded"),
            Err(err) => warn!(issuer = %name, error = %err, "Signing keys not yet available"),
        }
    }

    let gate = RequestGate::new(Arc::new(registry)).with_timeout(settings.auth_timeout);
    let state = AppState::new(InMemoryStore::new(), gate)
        .with_message_edit_window(settings.message_edit_window);
    let app = router(state);

    let addr: SocketAddr = settings.bind_address().parse()?;
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
            shutdown.cancel();
        }
    });

    match &settings.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            let handle = axum_server::Handle::new();
            tokio::spawn({
                let handle = handle.clone();
                let shutdown = shutdown.clone();
                async move {
                    shutdown.cancelled().await;
                    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
                }
            });

            info!(%addr, "Marketplace auth listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "Marketplace auth listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?;
        }
    }

    info!("Server stopped");
    Ok(())
}
