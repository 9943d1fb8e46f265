//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → /ws     → websocket.rs (upgrade, frame codec, session loop)
//!     → /status → admin handlers (read-only directory view)
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
pub use websocket::{ClientPacket, ServerPacket, WsConnection};
