//! Namespace error definitions.

use thiserror::Error;

/// Error type returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by channel resolution, attachment and sweeping.
///
/// Routing misses and rejected inits are not errors: resolution reports them
/// as `Ok(None)`.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// An init callback failed while setting up a channel.
    #[error("init callback for {channel} failed: {source}")]
    InitFailed {
        channel: String,
        #[source]
        source: BoxError,
    },

    /// An expire callback failed while a channel was being evicted.
    #[error("expire callback for {channel} failed: {source}")]
    ExpireFailed {
        channel: String,
        #[source]
        source: BoxError,
    },

    /// The channel was evicted before the connection could attach.
    #[error("channel {0} has expired")]
    Expired(String),
}
