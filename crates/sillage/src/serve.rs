//! HTTP server lifecycle: state construction, bind, graceful shutdown.

use anyhow::{Context, Result};
use sillageconf::SillageConfig;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::auth::TokenGuard;
use crate::media::MediaStore;
use crate::positions::PositionStore;
use crate::web::{self, AppState};

/// Build the shared state from configuration and create the upload directory.
pub async fn build_state(config: &SillageConfig) -> Result<AppState> {
    let media = MediaStore::new(config.infra.paths.upload_dir.clone());
    media
        .ensure_dir()
        .await
        .context("Failed to create upload directory")?;

    let guard = TokenGuard::new(config.auth.token.clone());
    if !guard.is_enabled() {
        warn!("no write token configured; position endpoints accept any request");
    }

    Ok(AppState::new(
        guard,
        PositionStore::new(config.infra.limits.max_positions),
        media,
    )
    .with_max_upload_bytes(config.infra.limits.max_upload_bytes))
}

/// Run the server until SIGINT/SIGTERM.
pub async fn run(config: SillageConfig) -> Result<()> {
    let state = build_state(&config).await?;
    let addr = config.infra.bind.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(
        %addr,
        upload_dir = %config.infra.paths.upload_dir.display(),
        max_positions = config.infra.limits.max_positions,
        "sillage ready"
    );

    serve(listener, state).await
}

/// Serve `state` on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = web::router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
