//! Namespace subsystem: channels, the directory that owns them, and the
//! timer that reclaims them.
//!
//! # Data Flow
//! ```text
//! resolve_channel(name, host, Auto | Explicit)
//!     → directory.rs (existing entry? return it)
//!     → routing::rules (exact name, then patterns newest first)
//!     → channel.rs (new Channel inserted, init callback runs)
//!
//! Last connection detaches:
//!     → channel.rs (deadline = now + retirement)
//!     → scheduler.rs (arm or keep the single cleanup timer)
//!     → directory.rs sweep (evict, fire expire callbacks, re-arm)
//! ```
//!
//! # Design Decisions
//! - Full names are unique: one live channel per `//host/name`
//! - Init succeeds at most once per channel
//! - Callbacks run synchronously and must not block: a slow callback stalls
//!   routing for every connection

pub mod channel;
pub mod directory;
pub mod error;
pub mod scheduler;
pub mod status;

pub use channel::{full_channel_name, normalize_name, Channel, Retirement, SetupState};
pub use directory::{ChannelDirectory, DirectoryOptions, Resolution, SweepReport, WeakChannelDirectory};
pub use error::{BoxError, ChannelError};
pub use scheduler::CleanupRequest;
pub use status::{ChannelStatus, DirectoryStatus};
