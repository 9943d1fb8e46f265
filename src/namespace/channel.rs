//! The channel ("namespace") entity.
//!
//! # Responsibilities
//! - Track attached connections
//! - Track the expiration deadline of an empty channel
//! - Hold expire callbacks and connect listeners
//!
//! # Design Decisions
//! - Deadline is infinite while any connection is attached
//! - Emptying a channel arms its deadline and asks the directory for a sweep
//! - Callbacks and listeners run after the channel lock is released

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::directory::{ChannelDirectory, Shared};
use super::error::{BoxError, ChannelError};
use crate::net::{Connection, ConnectionId};

/// Callback fired once when the channel is evicted.
pub type ExpireFn = Box<dyn FnOnce(&Arc<Channel>) -> Result<(), BoxError> + Send>;

/// Listener fired every time a connection attaches.
pub type ConnectFn = Arc<dyn Fn(&Arc<Channel>, &Arc<dyn Connection>) + Send + Sync>;

/// How long an empty channel lives before it may be evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    After(Duration),
    Never,
}

impl Retirement {
    pub fn from_millis(ms: u64) -> Self {
        Retirement::After(Duration::from_millis(ms))
    }

    /// Absolute deadline counted from `now`; `None` is infinity.
    pub fn deadline_from(self, now: Instant) -> Option<Instant> {
        match self {
            Retirement::After(delay) => now.checked_add(delay),
            Retirement::Never => None,
        }
    }
}

/// Progress of a channel's init callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupState {
    /// No rule has initialized the channel yet.
    Unset,
    InProgress,
    Accepted,
    Rejected,
}

/// Full, host-qualified channel name.
pub fn full_channel_name(name: &str, host: Option<&str>) -> String {
    match host {
        Some(host) => format!("//{}{}", host, name),
        None => name.to_string(),
    }
}

/// Prefix `name` with `/` when missing.
pub fn normalize_name(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}", name)
    }
}

/// What a sweep found when it looked at one channel.
pub(crate) enum SweepOutcome {
    /// Past its deadline: evicted, with the callbacks still to run.
    Expired(Vec<ExpireFn>),
    /// Empty and counting down.
    Pending(Instant),
    /// Attached connections or infinite retirement.
    Live,
}

struct ChannelState {
    connections: HashMap<ConnectionId, Arc<dyn Connection>>,
    retirement: Retirement,
    expiration: Option<Instant>,
    setup: SetupState,
    expired: bool,
    expire_callbacks: Vec<ExpireFn>,
    connect_listeners: Vec<ConnectFn>,
}

/// One logical communication channel.
pub struct Channel {
    name: String,
    host: Option<String>,
    full_name: String,
    directory: Weak<Shared>,
    state: Mutex<ChannelState>,
}

impl Channel {
    pub(crate) fn new(
        name: String,
        host: Option<String>,
        retirement: Retirement,
        directory: Weak<Shared>,
    ) -> Arc<Self> {
        let full_name = full_channel_name(&name, host.as_deref());
        Arc::new(Self {
            name,
            host,
            full_name,
            directory,
            state: Mutex::new(ChannelState {
                connections: HashMap::new(),
                retirement,
                expiration: None,
                setup: SetupState::Unset,
                expired: false,
                expire_callbacks: Vec::new(),
                connect_listeners: Vec::new(),
            }),
        })
    }

    /// Channel not registered with any directory.
    #[cfg(test)]
    pub(crate) fn detached(name: &str) -> Arc<Self> {
        Self::new(normalize_name(name), None, Retirement::Never, Weak::new())
    }

    /// Local name, always starting with `/`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host this channel is scoped to, `None` for host-agnostic channels.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The directory that owns this channel, while it is still alive.
    pub fn directory(&self) -> Option<ChannelDirectory> {
        self.directory.upgrade().map(ChannelDirectory::from_shared)
    }

    pub fn retirement(&self) -> Retirement {
        self.state.lock().retirement
    }

    /// Change the retirement. Takes effect the next time the channel empties.
    pub fn set_retirement(&self, retirement: Retirement) {
        self.state.lock().retirement = retirement;
    }

    pub fn setup_state(&self) -> SetupState {
        self.state.lock().setup
    }

    pub(crate) fn set_setup_state(&self, setup: SetupState) {
        self.state.lock().setup = setup;
    }

    /// Move `Unset` to `InProgress`; false if setup already started elsewhere.
    pub(crate) fn claim_setup(&self) -> bool {
        let mut state = self.state.lock();
        if state.setup == SetupState::Unset {
            state.setup = SetupState::InProgress;
            true
        } else {
            false
        }
    }

    /// Close a channel whose init callback rejected it, unless connections
    /// attached while the callback ran. Returns true if it was closed; later
    /// attaches then fail with [`ChannelError::Expired`]. A channel that is
    /// already in use goes back to `Unset` and stays live.
    pub(crate) fn close_rejected(&self) -> bool {
        let mut state = self.state.lock();
        if state.connections.is_empty() {
            state.setup = SetupState::Rejected;
            state.expired = true;
            true
        } else {
            state.setup = SetupState::Unset;
            false
        }
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.state.lock().connections.keys().copied().collect();
        ids.sort_by_key(ConnectionId::as_u64);
        ids
    }

    pub fn is_attached(&self, id: ConnectionId) -> bool {
        self.state.lock().connections.contains_key(&id)
    }

    /// True once a sweep evicted this channel.
    pub fn is_expired(&self) -> bool {
        self.state.lock().expired
    }

    /// Current expiration deadline; `None` is infinity.
    pub fn expiration(&self) -> Option<Instant> {
        let state = self.state.lock();
        if state.connections.is_empty() {
            state.expiration
        } else {
            None
        }
    }

    /// Attach a connection and fire the connect listeners.
    ///
    /// Attaching resets the deadline to infinity. Fails only when the channel
    /// has already been evicted; callers should resolve the name again.
    pub fn attach(self: &Arc<Self>, connection: Arc<dyn Connection>) -> Result<(), ChannelError> {
        let listeners = {
            let mut state = self.state.lock();
            if state.expired {
                return Err(ChannelError::Expired(self.full_name.clone()));
            }
            state.expiration = None;
            state.connections.insert(connection.id(), Arc::clone(&connection));
            state.connect_listeners.clone()
        };

        tracing::debug!(
            full_name = %self.full_name,
            connection_id = %connection.id(),
            "Connection attached"
        );

        for listener in listeners {
            listener(self, &connection);
        }
        Ok(())
    }

    /// Detach a connection. Returns false if it was not attached.
    ///
    /// Emptying the channel sets its deadline to `now + retirement` and asks
    /// the directory to sweep after the retirement.
    pub fn detach(&self, id: ConnectionId) -> bool {
        let emptied = {
            let mut state = self.state.lock();
            if state.connections.remove(&id).is_none() {
                return false;
            }
            if state.connections.is_empty() {
                state.expiration = state.retirement.deadline_from(Instant::now());
                Some(state.retirement)
            } else {
                None
            }
        };

        tracing::debug!(full_name = %self.full_name, connection_id = %id, "Connection detached");

        if let Some(retirement) = emptied {
            if let Some(directory) = self.directory() {
                directory.request_cleanup_after(retirement);
            }
        }
        true
    }

    /// Register a callback fired once, when the channel is evicted.
    /// Callbacks fire in registration order.
    pub fn on_expire<F>(&self, callback: F)
    where
        F: FnOnce(&Arc<Channel>) -> Result<(), BoxError> + Send + 'static,
    {
        self.state.lock().expire_callbacks.push(Box::new(callback));
    }

    /// Register a listener fired for every connection that attaches.
    pub fn on_connect<F>(&self, listener: F)
    where
        F: Fn(&Arc<Channel>, &Arc<dyn Connection>) + Send + Sync + 'static,
    {
        self.state.lock().connect_listeners.push(Arc::new(listener));
    }

    /// Evict the channel if its deadline has passed.
    pub(crate) fn sweep(&self, now: Instant) -> SweepOutcome {
        let mut state = self.state.lock();
        if !state.connections.is_empty() {
            return SweepOutcome::Live;
        }
        match state.expiration {
            Some(deadline) if deadline <= now => {
                state.expired = true;
                SweepOutcome::Expired(std::mem::take(&mut state.expire_callbacks))
            }
            Some(deadline) => SweepOutcome::Pending(deadline),
            None => SweepOutcome::Live,
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Channel")
            .field("full_name", &self.full_name)
            .field("connections", &state.connections.len())
            .field("retirement", &state.retirement)
            .field("setup", &state.setup)
            .field("expired", &state.expired)
            .finish()
    }
}
