//! Heisei forum server binary.

use anyhow::Result;
use clap::Parser;
use heisei_server::server::{init_tracing, run};
use heisei_server::ServerConfig;
use std::path::PathBuf;

/// Forum HTTP server
#[derive(Debug, Parser)]
#[command(name = "heisei-server", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Insert the default categories at startup
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log.level);
    run(config, cli.seed).await
}
