//! Video mesh node
//!
//! Streams the local camera to every configured peer and shows their feeds.
//! Usage: `node [config.toml]`. Keys are read from stdin (`m` rotate,
//! `s` skip a transition, `q` quit by default); Ctrl+C also quits.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_video_mesh::{
    app::{Orchestrator, SessionLifecycle},
    config::AppConfig,
    display::HeadlessDisplay,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LAN video mesh node");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref()).context("Failed to load configuration")?;

    let title = config
        .peers
        .iter()
        .find(|p| p.id == config.node.id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| config.node.id.to_string());
    tracing::info!("Node {} ({}) on UDP port {}", config.node.id, title, config.network.udp_port);

    let lifecycle = SessionLifecycle::new();

    // The orchestrator owns blocking loops; keep it off the async workers
    let node_lifecycle = lifecycle.clone();
    let node = tokio::task::spawn_blocking(move || -> Result<()> {
        let display = HeadlessDisplay::new(title)
            .with_key_source(std::io::stdin())
            .context("Failed to start key input")?;
        let orchestrator =
            Orchestrator::new(config, display, node_lifecycle).context("Failed to start node")?;
        orchestrator.run().context("Node stopped with an error")
    });

    let signal_lifecycle = lifecycle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received");
            signal_lifecycle.cancel();
        }
    });

    let result = node.await.context("Node task panicked")?;
    lifecycle.cancel();
    result?;

    tracing::info!("Node shut down");
    Ok(())
}
