//! Webhook HTTP server.
//!
//! ```text
//!  POST /  ──> api::receive_push
//!                 │ parse repository.name      (400 on failure)
//!                 │ BindResolver::resolve      ("Repository Flagged" on miss)
//!                 │ DeadContainerReaper::sweep
//!                 v
//!              ContainerOrchestrator::ensure_running ──> ContainerEngine
//!
//!  reaper task: DeadContainerReaper::sweep every `reap_interval`
//! ```

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::binds::BindResolver;
use crate::config::HookConfig;
use crate::engine::ContainerEngine;
use crate::orchestrator::ContainerOrchestrator;
use crate::reaper::DeadContainerReaper;

pub use api::{AppState, SharedState, build_router};

/// Wire the components for `config` against `engine`.
pub fn build_state(config: &HookConfig, engine: Arc<dyn ContainerEngine>) -> SharedState {
    Arc::new(AppState {
        resolver: BindResolver::new(config.binds.clone()),
        orchestrator: ContainerOrchestrator::new(Arc::clone(&engine), config.command.clone()),
        reaper: Arc::new(DeadContainerReaper::new(engine)),
        image: config.image.clone(),
    })
}

/// Serve webhooks until Ctrl-C, running the periodic reaper alongside.
pub async fn start_server(config: HookConfig, engine: Arc<dyn ContainerEngine>) -> Result<()> {
    let state = build_state(&config, engine);
    let binds = state.resolver.len();
    if state.resolver.is_empty() {
        warn!("no binds configured; every push will be flagged");
    }

    let reaper_task = Arc::clone(&state.reaper).spawn_periodic(config.reap_interval);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(addr = %listener.local_addr()?, binds, "listening for webhooks");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    reaper_task.abort();
    info!("server shut down");
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler; shutdown only by termination");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
