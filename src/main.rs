//! Dynamic channel server.
//!
//! # Architecture Overview
//!
//! ```text
//!     WebSocket client
//!     ────────────────▶  http::websocket  ──▶  net::Session  ──▶  namespace::ChannelDirectory
//!                          (frames)             (host scope,         │  routing::PatternRegistry
//!                                                default "/",        │  routing::HostRule
//!                                                buffering)          ▼
//!                                                               namespace::Channel
//!                                                                    │ detach → deadline
//!                                                                    ▼
//!                                                               cleanup timer → sweep
//!
//!     GET /status  ──▶  admin::handlers  ──▶  ChannelDirectory::status_for_host
//! ```

use std::path::PathBuf;

use clap::Parser;

use dynamic_namespaces::config::{load_config, ServerConfig};
use dynamic_namespaces::lifecycle;
use dynamic_namespaces::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "dynamic-namespaces")]
#[command(about = "WebSocket server with dynamically created channels", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "dynamic-namespaces starting"
    );

    lifecycle::run(config).await?;
    Ok(())
}
