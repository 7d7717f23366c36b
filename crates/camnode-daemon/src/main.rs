//! CamNode daemon entry point.
//!
//! Wires together configuration, the network-readiness gate, and the
//! discovery worker, then parks on the shutdown signal.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config + CLI overrides
//!  └─ NetworkGate            -- readiness/shutdown signal
//!  └─ discovery::worker      -- dedicated blocking thread
//!       └─ MulticastTransport -- one UDP socket per session
//! ```
//!
//! The camera snapshot and LED HTTP surface of a CamNode unit is served by a
//! separate component; this binary is only the discovery participant. The
//! connectivity observer owns the gate: it reports "ready" when the station
//! holds an address and clears the flag when the link drops. On a host build
//! the interface is managed by the OS, so the gate is set once at startup.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use camnode_daemon::config::{self, AppConfig};
use camnode_daemon::discovery::{worker, DiscoverySettings, MulticastTransport};
use camnode_daemon::gate::NetworkGate;

/// Discovery daemon for CamNode camera/LED units.
#[derive(Debug, Parser)]
#[command(name = "camnode-daemon", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "CAMNODE_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured device id (0..=4095).
    #[arg(long, env = "CAMNODE_DEVICE_ID")]
    device_id: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut cfg: AppConfig =
        config::load_config(args.config.as_deref()).context("loading configuration")?;
    cfg.apply_overrides(args.device_id);
    cfg.validate().context("validating configuration")?;

    // Initialise structured logging. `RUST_LOG` wins; the config file's
    // log level is the fallback.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.node.log_level)),
        )
        .init();

    info!(
        "camnode-daemon starting; device id {} on {}:{}",
        cfg.node.device_id, cfg.discovery.group, cfg.discovery.port
    );

    let gate = Arc::new(NetworkGate::new());
    let transport = MulticastTransport::new(cfg.discovery.group.clone(), cfg.discovery.port);
    let handle = worker::spawn(transport, Arc::clone(&gate), DiscoverySettings::from(&cfg))
        .context("spawning discovery worker")?;

    // The connectivity observer flips this when the station gains or loses
    // its address; on a host build the link is up by the time we start.
    gate.set_ready(true);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    gate.shutdown();
    if handle.join().is_err() {
        anyhow::bail!("discovery worker panicked");
    }

    info!("camnode-daemon stopped");
    Ok(())
}
