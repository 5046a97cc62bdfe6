//! Foresight service binary internals: app state, HTTP surface,
//! background loops, project registry.

use anyhow::{Context as AnyhowContext, Result};
use std::path::Path;
use std::sync::Arc;

pub mod app;
pub mod http_api;
pub mod latency;
pub mod loops;
pub mod projects;

#[cfg(test)]
mod tests;

pub use app::{AppConfig, AppState};
pub use http_api::app_router;

/// Bring up state for one project root and serve until ctrl-c.
pub async fn serve(config: AppConfig, project_root: &Path, bind: &str) -> Result<()> {
    let state = AppState::initialize(config).await?;
    state
        .enable_project(project_root)
        .await
        .with_context(|| format!("cannot enable project at {}", project_root.display()))?;
    loops::spawn_background_loops(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    log::info!("foresight listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app_router(Arc::clone(&state)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("http server failed")?;

    // Persist learned state on the way out.
    state.flush().await?;
    Ok(())
}
