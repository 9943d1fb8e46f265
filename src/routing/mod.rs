//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound connection (raw Host header)
//!     → host.rs (normalize, compare with the main host rule)
//!     → scoped host or host-agnostic
//!
//! Channel lookup miss (full name)
//!     → rules.rs (exact names, then patterns newest first)
//!     → Return: handler + match info, or no match
//! ```
//!
//! # Design Decisions
//! - Deterministic: same rules and name always pick the same handler
//! - Exact names beat patterns; later patterns beat earlier ones
//! - Rules are never removed

pub mod host;
pub mod rules;

pub use host::{HostNormalizer, HostRule, StandardNormalizer};
pub use rules::{Handler, InitFn, MatchInfo, NameRule, PatternRegistry, Setup};
