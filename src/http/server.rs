//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, status auth)
//! - Bind server to listener
//! - Stop on the shutdown broadcast

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

use crate::admin::{self, auth::AuthState};
use crate::config::ServerConfig;
use crate::http::websocket::ws_handler;
use crate::lifecycle::Shutdown;
use crate::namespace::ChannelDirectory;
use crate::net::ConnectionTracker;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: ChannelDirectory,
    pub tracker: ConnectionTracker,
    pub connection_limit: Arc<Semaphore>,
    pub shutdown: Arc<Shutdown>,
}

/// HTTP server exposing the WebSocket transport and the status view.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server over `directory`.
    pub fn new(config: &ServerConfig, directory: ChannelDirectory, shutdown: Arc<Shutdown>) -> Self {
        let state = AppState {
            directory,
            tracker: ConnectionTracker::new(),
            connection_limit: Arc::new(Semaphore::new(config.listener.max_connections)),
            shutdown,
        };
        let router = Self::build_router(config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let mut router = Router::new().route("/ws", get(ws_handler));

        if config.status.public {
            let mut status = Router::new().route("/status", get(admin::handlers::get_status));
            if let Some(token) = &config.status.api_key {
                status = status.layer(middleware::from_fn_with_state(
                    AuthState { token: token.clone() },
                    admin::auth::status_auth_middleware,
                ));
            }
            router = router.merge(status);
        }

        router.with_state(state).layer(TraceLayer::new_for_http())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown broadcast fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = Arc::clone(&self.state.shutdown);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!(active_connections = self.state.tracker.active_count(), "HTTP server stopped");
        Ok(())
    }
}
