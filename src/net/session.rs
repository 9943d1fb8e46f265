//! Per-connection channel membership.
//!
//! # Responsibilities
//! - Work out the host a connection is scoped to
//! - Attach the connection to its default channel `/` first
//! - Buffer other channel requests until the default channel is settled
//! - Answer unknown channel names with a protocol-level rejection
//!
//! # Design Decisions
//! - The default channel's connect listeners always fire before any other
//!   channel's for the same connection
//! - A refused default channel does not block the connection: buffered and
//!   later requests are still served
//! - Attaching to a channel evicted mid-flight resolves the name once more

use std::collections::HashMap;
use std::sync::Arc;

use super::connection::Connection;
use crate::namespace::{normalize_name, Channel, ChannelDirectory, ChannelError, Resolution};

/// Rejection text sent for names no rule covers.
pub const INVALID_NAMESPACE: &str = "Invalid namespace";

const DEFAULT_CHANNEL: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultChannel {
    Pending,
    Attached,
    Refused,
}

/// Outcome of a channel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// Held back until the default channel is settled.
    Buffered,
    /// No rule covers the name, or its init rejected it.
    Refused,
}

/// A connection's view of the channels it belongs to.
pub struct Session {
    directory: ChannelDirectory,
    connection: Arc<dyn Connection>,
    host: Option<String>,
    default: DefaultChannel,
    buffer: Vec<String>,
    channels: HashMap<String, Arc<Channel>>,
}

impl Session {
    /// Scope the connection to its host. Nothing is attached until [`start`](Self::start).
    pub fn new(directory: ChannelDirectory, connection: Arc<dyn Connection>) -> Self {
        let host = directory.scoped_host(connection.host().as_deref());
        tracing::debug!(connection_id = %connection.id(), host = ?host, "Connection onboarded");
        Self {
            directory,
            connection,
            host,
            default: DefaultChannel::Pending,
            buffer: Vec::new(),
            channels: HashMap::new(),
        }
    }

    /// Join the default channel, then replay buffered requests.
    pub fn start(&mut self) -> Result<JoinOutcome, ChannelError> {
        self.connect(DEFAULT_CHANNEL)
    }

    /// Host this connection is scoped to; `None` means the main host.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Local names of the channels currently joined.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn channel(&self, name: &str) -> Option<&Arc<Channel>> {
        self.channels.get(&normalize_name(name))
    }

    /// Join channel `name` (local name; the session's host is applied).
    pub fn connect(&mut self, name: &str) -> Result<JoinOutcome, ChannelError> {
        let name = normalize_name(name);
        if name != DEFAULT_CHANNEL && self.default == DefaultChannel::Pending {
            tracing::trace!(connection_id = %self.connection.id(), channel = %name, "Buffering channel request");
            self.buffer.push(name);
            return Ok(JoinOutcome::Buffered);
        }
        if self.channels.contains_key(&name) {
            return Ok(JoinOutcome::Joined);
        }

        let outcome = self.join(&name)?;
        if name == DEFAULT_CHANNEL && self.default == DefaultChannel::Pending {
            self.default = match outcome {
                JoinOutcome::Joined => DefaultChannel::Attached,
                _ => DefaultChannel::Refused,
            };
            self.replay_buffer()?;
        }
        Ok(outcome)
    }

    fn join(&mut self, name: &str) -> Result<JoinOutcome, ChannelError> {
        // A second pass covers a channel evicted between lookup and attach.
        for _ in 0..2 {
            let Some(channel) = self.directory.resolve_channel(name, self.host.as_deref(), Resolution::Auto)? else {
                tracing::debug!(
                    connection_id = %self.connection.id(),
                    channel = %name,
                    host = ?self.host,
                    "Channel request refused"
                );
                self.connection.send_error(name, INVALID_NAMESPACE);
                return Ok(JoinOutcome::Refused);
            };
            match channel.attach(Arc::clone(&self.connection)) {
                Ok(()) => {
                    self.connection.send_connect(name);
                    self.channels.insert(name.to_string(), channel);
                    return Ok(JoinOutcome::Joined);
                }
                Err(ChannelError::Expired(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ChannelError::Expired(name.to_string()))
    }

    fn replay_buffer(&mut self) -> Result<(), ChannelError> {
        let mut first_error = None;
        for name in std::mem::take(&mut self.buffer) {
            if let Err(e) = self.connect(&name) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Leave channel `name`. Returns false if it was not joined.
    pub fn disconnect(&mut self, name: &str) -> bool {
        let name = normalize_name(name);
        match self.channels.remove(&name) {
            Some(channel) => channel.detach(self.connection.id()),
            None => {
                self.buffer.retain(|buffered| *buffered != name);
                false
            }
        }
    }

    /// Leave every channel. Called when the transport connection goes away.
    pub fn close(&mut self) {
        self.buffer.clear();
        for (_, channel) in self.channels.drain() {
            channel.detach(self.connection.id());
        }
        tracing::debug!(connection_id = %self.connection.id(), "Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.channels.is_empty() {
            self.close();
        }
    }
}
