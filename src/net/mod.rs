//! Connection layer subsystem.
//!
//! # Data Flow
//! ```text
//! Transport connection (WebSocket)
//!     → connection.rs (identity, live count, Connection trait)
//!     → session.rs (host scoping, default channel, buffered requests)
//!     → namespace directory (resolve + attach)
//! ```
//!
//! # Design Decisions
//! - The directory only sees the narrow `Connection` trait, never a socket
//! - Every session joins `/` before any other channel

pub mod connection;
pub mod session;

pub use connection::{Connection, ConnectionGuard, ConnectionId, ConnectionTracker};
pub use session::{JoinOutcome, Session, INVALID_NAMESPACE};
