//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the channel directory from validated configuration
//! - Start the metrics exporter
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when the directory is ready)

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use super::shutdown::Shutdown;
use super::signals::spawn_signal_handler;
use crate::config::{NamespaceSetupError, ServerConfig};
use crate::http::HttpServer;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to set up channels: {0}")]
    Namespaces(#[from] NamespaceSetupError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the server described by `config` until a stop signal arrives.
pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let directory = config.namespaces.build_directory()?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    tracing::info!(
        address = %listener.local_addr()?,
        max_connections = config.listener.max_connections,
        status_public = config.status.public,
        "Listening for connections"
    );

    let shutdown = Arc::new(Shutdown::new());
    let signals = spawn_signal_handler(Arc::clone(&shutdown));

    let server = HttpServer::new(&config, directory.clone(), shutdown);
    let result = server.run(listener).await;

    signals.abort();
    directory.shutdown();
    tracing::info!(channels = directory.len(), "Shutdown complete");
    Ok(result?)
}
