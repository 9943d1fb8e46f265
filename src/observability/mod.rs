//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Directory, sessions and the HTTP layer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Connection IDs and full channel names flow through every log event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
