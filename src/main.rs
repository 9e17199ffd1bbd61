//! Portico — the transport-and-authorization core of a browser-facing
//! application server.
//!
//! A single-process server exposing registered services over a WebSocket
//! message channel, authorized by compact self-contained signed tokens.
//!
//! Usage:
//!   portico                                  # Default port, generated key
//!   portico --port 8080                      # Custom port
//!   portico --signing-key <hex>              # Stable token signing key
//!   portico --verbose                        # Debug logging

mod system;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use portico_server::{Dispatcher, ServiceMap};
use portico_token::{SigningKey, TokenCodec};
use portico_transport::{TransportConfig, TransportServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "portico", about = "Portico application server core")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8090")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "256")]
    max_connections: usize,

    /// Per-connection outbound queue depth
    #[arg(long, default_value = "256")]
    queue_depth: usize,

    /// Token signing key as hex. A random key is generated when absent,
    /// which invalidates outstanding tokens on restart.
    #[arg(long)]
    signing_key: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let key = match &cli.signing_key {
        Some(hex_key) => SigningKey::new(
            hex::decode(hex_key).context("--signing-key must be a hex string")?,
        ),
        None => {
            warn!("no signing key configured; tokens will not survive a restart");
            SigningKey::generate()
        }
    };
    let codec = Arc::new(TokenCodec::new(key));

    // Amalgamate service map fragments. Additional modules merge theirs
    // here before the hub starts.
    let mut services = ServiceMap::new();
    services.merge(system::services()?)?;
    info!(services = services.len(), "service map assembled");

    let dispatcher = Arc::new(Dispatcher::new(services));

    let config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        max_connections: Some(cli.max_connections),
        queue_depth: cli.queue_depth,
    };
    let mut server = TransportServer::start(config, codec, dispatcher)
        .await
        .context("failed to start transport server")?;

    info!(port = server.port(), "portico running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    server.stop().await;
    Ok(())
}
