use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "dockhook")]
#[command(version, about = "Launch a git-pull container for every repository push")]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = dockhook::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Listen port; overrides `port` from the config file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Use an in-memory engine instead of the Docker daemon
    #[arg(long)]
    pub dry_run: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cmd::cmd_serve(&cli).await
}
