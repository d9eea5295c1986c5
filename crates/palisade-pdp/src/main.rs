//! Policy decision point

use anyhow::{Context, Result};
use clap::Parser;
use palisade_core::SystemClock;
use palisade_pdp::{PdpConfig, PdpService};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "palisade-pdp")]
#[command(about = "Palisade policy decision point", long_about = None)]
struct Cli {
    /// Host whose verification key is fetched at startup
    #[arg(long)]
    authentication: Option<IpAddr>,

    /// Signature algorithm identifier
    #[arg(long)]
    crypto: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let mut config = match &cli.config {
        Some(path) => PdpConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PdpConfig::default(),
    };
    if cli.authentication.is_some() {
        config.authentication = cli.authentication;
    }
    if let Some(algorithm) = cli.crypto {
        config.crypto.algorithm = algorithm;
    }

    let mut service = PdpService::open(&config, Arc::new(SystemClock))
        .context("starting decision point")?;
    service.wait();
    Ok(())
}
