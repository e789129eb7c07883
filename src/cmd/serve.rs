//! Webhook server command — `dockhook`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use dockhook::config::HookConfig;
use dockhook::engine::{ContainerEngine, DockerEngine, InMemoryEngine};

use crate::Cli;

pub async fn cmd_serve(cli: &Cli) -> Result<()> {
    let mut config = HookConfig::load(&cli.config)
        .with_context(|| format!("Invalid config {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let _log_guard = dockhook::logging::init(cli.verbose, config.log_file.as_deref())?;
    info!(
        config = %cli.config.display(),
        image = %config.image,
        reap_interval_secs = config.reap_interval.as_secs(),
        "starting dockhook"
    );

    let engine: Arc<dyn ContainerEngine> = if cli.dry_run {
        info!("dry run: containers live in memory only");
        Arc::new(InMemoryEngine::dry_run())
    } else {
        Arc::new(DockerEngine::connect().context("Unable to create docker client")?)
    };

    dockhook::server::start_server(config, engine).await
}
