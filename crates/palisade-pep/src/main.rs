//! Policy enforcement point
//!
//! Bridges a secure and an insecure network segment, tunnelling frames only
//! where the decision point grants it.

use anyhow::{Context, Result};
use clap::Parser;
use palisade_core::SystemClock;
use palisade_pep::{ForwardingBridge, NetworkBridge, PepConfig, TunnelEndpoint};
use palisade_transport::{FrameInterface, UdpFrameInterface, UdpOptions};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "palisade-pep")]
#[command(about = "Palisade policy enforcement point", long_about = None)]
struct Cli {
    /// Secure-side frame tunnel, `bind=peer`
    #[arg(long)]
    secure: Option<TunnelEndpoint>,

    /// Insecure-side frame tunnel, `bind=peer`
    #[arg(long)]
    insecure: Option<TunnelEndpoint>,

    /// Decision point address
    #[arg(long)]
    authorization: Option<IpAddr>,

    /// Host whose verification key is fetched at startup
    #[arg(long)]
    authentication: Option<IpAddr>,

    /// Signature algorithm identifier
    #[arg(long)]
    crypto: Option<String>,

    /// Own address, as named in decisions
    #[arg(long)]
    scope: Option<IpAddr>,

    /// Forward all frames without access control
    #[arg(long)]
    forward: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, config: &mut PepConfig) {
        if self.secure.is_some() {
            config.secure = self.secure;
        }
        if self.insecure.is_some() {
            config.insecure = self.insecure;
        }
        if self.authorization.is_some() {
            config.authorization = self.authorization;
        }
        if self.authentication.is_some() {
            config.authentication = self.authentication;
        }
        if let Some(algorithm) = self.crypto {
            config.crypto.algorithm = algorithm;
        }
        if self.scope.is_some() {
            config.scope = self.scope;
        }
        config.forward_only |= self.forward;
    }
}

fn tunnel(endpoint: TunnelEndpoint, options: &UdpOptions) -> Result<Arc<dyn FrameInterface>> {
    let interface = UdpFrameInterface::bind(endpoint.bind, endpoint.peer, options)
        .with_context(|| format!("binding frame tunnel {endpoint}"))?;
    Ok(Arc::new(interface))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let mut config = match &cli.config {
        Some(path) => PepConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PepConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let (secure, insecure) = config.tunnels()?;
    let secure = tunnel(secure, &config.udp)?;
    let insecure = tunnel(insecure, &config.udp)?;

    if config.forward_only {
        let mut bridge = ForwardingBridge::open(secure, insecure, config.udp.poll_interval())?;
        bridge.wait();
    } else {
        let mut bridge =
            NetworkBridge::open(config.bridge_config()?, secure, insecure, Arc::new(SystemClock))?;
        bridge.wait();
    }
    Ok(())
}
