//! The channel directory.
//!
//! # Responsibilities
//! - Own the mapping from full channel name to channel
//! - Resolve names lazily through the pattern registry
//! - Run init callbacks, including back-fill for late registrations
//! - Drive the single cleanup timer and sweep expired channels
//!
//! # Design Decisions
//! - One mutex guards the map, the registry and the timer; lock order is
//!   always directory before channel
//! - A new channel is inserted before its init callback runs, so reentrant
//!   resolution of the same name returns it instead of recursing
//! - No lock is held while user callbacks run

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::channel::{
    full_channel_name, normalize_name, Channel, Retirement, SetupState, SweepOutcome,
};
use super::error::{BoxError, ChannelError};
use super::scheduler::{CleanupRequest, CleanupTimer};
use crate::net::{Connection, Session};
use crate::observability::metrics;
use crate::routing::{Handler, HostNormalizer, HostRule, MatchInfo, NameRule, PatternRegistry, Setup, StandardNormalizer};

/// Retirement for auto-created channels when nothing else is configured.
pub const DEFAULT_RETIREMENT: Duration = Duration::from_secs(10);

/// Why a channel is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Triggered by a connection. Only names covered by a rule are created.
    Auto,
    /// Explicit pre-registration. Always creates, with infinite retirement.
    Explicit,
}

impl Resolution {
    fn label(self) -> &'static str {
        match self {
            Resolution::Auto => "auto",
            Resolution::Explicit => "explicit",
        }
    }
}

/// Construction options for a [`ChannelDirectory`].
pub struct DirectoryOptions {
    pub main_host: HostRule,
    pub normalizer: Arc<dyn HostNormalizer>,
    pub default_retirement: Retirement,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            main_host: HostRule::Any,
            normalizer: Arc::new(StandardNormalizer::default()),
            default_retirement: Retirement::After(DEFAULT_RETIREMENT),
        }
    }
}

impl DirectoryOptions {
    pub fn with_main_host(mut self, main_host: HostRule) -> Self {
        self.main_host = main_host;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn HostNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_retirement(mut self, retirement: Retirement) -> Self {
        self.default_retirement = retirement;
        self
    }
}

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Full names of the channels evicted, in eviction order.
    pub expired: Vec<String>,
    /// Expire callbacks that failed. Eviction went ahead regardless.
    pub faults: Vec<ChannelError>,
    /// Nominal deadline of the next sweep, if one is armed.
    pub next_sweep: Option<Instant>,
}

struct DirectoryState {
    channels: HashMap<String, Arc<Channel>>,
    registry: PatternRegistry,
    timer: CleanupTimer,
}

pub(crate) struct Shared {
    state: Mutex<DirectoryState>,
    main_host: HostRule,
    normalizer: Arc<dyn HostNormalizer>,
    default_retirement: Retirement,
}

/// Server-owned registry of live channels. Cheap to clone.
#[derive(Clone)]
pub struct ChannelDirectory {
    shared: Arc<Shared>,
}

/// Non-owning handle, for callbacks that must not keep the directory alive.
#[derive(Clone)]
pub struct WeakChannelDirectory {
    shared: Weak<Shared>,
}

impl WeakChannelDirectory {
    pub fn upgrade(&self) -> Option<ChannelDirectory> {
        self.shared.upgrade().map(ChannelDirectory::from_shared)
    }
}

impl ChannelDirectory {
    /// Create a directory holding the default channel `/`.
    pub fn new(options: DirectoryOptions) -> Self {
        let directory = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DirectoryState {
                    channels: HashMap::new(),
                    registry: PatternRegistry::new(),
                    timer: CleanupTimer::new(),
                }),
                main_host: options.main_host,
                normalizer: options.normalizer,
                default_retirement: options.default_retirement,
            }),
        };
        let mut state = directory.shared.state.lock();
        let root = Channel::new("/".to_string(), None, Retirement::Never, Arc::downgrade(&directory.shared));
        state.channels.insert(root.full_name().to_string(), root);
        drop(state);
        directory
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn downgrade(&self) -> WeakChannelDirectory {
        WeakChannelDirectory {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn main_host(&self) -> &HostRule {
        &self.shared.main_host
    }

    pub fn normalizer(&self) -> &dyn HostNormalizer {
        &*self.shared.normalizer
    }

    pub fn default_retirement(&self) -> Retirement {
        self.shared.default_retirement
    }

    /// Host a connection is scoped to: `None` when the host is missing or
    /// matches the main host, otherwise the normalized host.
    ///
    /// Raw hosts that normalize alike share scoped channels, so with port
    /// stripping on `a.com:1` and `a.com:2` both land in `//a.com/...`.
    pub fn scoped_host(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw.map(str::trim).filter(|h| !h.is_empty())?;
        if self.shared.main_host.matches(Some(raw), self.normalizer()) {
            None
        } else {
            Some(self.shared.normalizer.normalize(raw))
        }
    }

    /// Register a name rule.
    ///
    /// Existing channels that match and were never initialized are set up
    /// immediately. The first init failure is returned after every matching
    /// channel has been tried.
    pub fn register_rule<R, F>(&self, rule: R, init: F) -> Result<(), ChannelError>
    where
        R: Into<NameRule>,
        F: Fn(&Arc<Channel>, &MatchInfo) -> Result<Setup, BoxError> + Send + Sync + 'static,
    {
        self.register(rule.into(), Handler { init: Arc::new(init), retirement: None })
    }

    /// Register a name rule whose auto-created channels use `retirement`
    /// instead of the directory default.
    pub fn register_rule_with_retirement<R, F>(
        &self,
        rule: R,
        retirement: Retirement,
        init: F,
    ) -> Result<(), ChannelError>
    where
        R: Into<NameRule>,
        F: Fn(&Arc<Channel>, &MatchInfo) -> Result<Setup, BoxError> + Send + Sync + 'static,
    {
        self.register(
            rule.into(),
            Handler {
                init: Arc::new(init),
                retirement: Some(retirement),
            },
        )
    }

    fn register(&self, rule: NameRule, handler: Handler) -> Result<(), ChannelError> {
        let pending: Vec<(Arc<Channel>, MatchInfo)> = {
            let mut state = self.shared.state.lock();
            let pending = state
                .channels
                .values()
                .filter(|channel| channel.setup_state() == SetupState::Unset)
                .filter_map(|channel| rule.matches(channel.full_name()).map(|info| (Arc::clone(channel), info)))
                .collect();
            tracing::debug!(rule = ?rule, "Channel rule registered");
            state.registry.register(rule, handler.clone());
            pending
        };

        let mut first_error = None;
        for (channel, info) in pending {
            if !channel.claim_setup() {
                continue;
            }
            match (handler.init)(&channel, &info) {
                Ok(Setup::Accept) => channel.set_setup_state(SetupState::Accepted),
                Ok(Setup::Reject) => {
                    // Back-filled channels are already live, so they stay.
                    tracing::debug!(full_name = %channel.full_name(), "Late rule declined existing channel");
                    channel.set_setup_state(SetupState::Unset);
                }
                Err(source) => {
                    tracing::error!(full_name = %channel.full_name(), error = %source, "Init callback failed");
                    if first_error.is_none() {
                        first_error = Some(ChannelError::InitFailed {
                            channel: channel.full_name().to_string(),
                            source,
                        });
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Find or create the channel `name` scoped to `host`.
    ///
    /// Returns `Ok(None)` for a routing miss on an auto request and when the
    /// init callback rejects the channel. A rejected channel is closed and
    /// removed, unless a concurrent resolver attached to it while init ran.
    /// An init callback error propagates; the channel then stays registered
    /// with setup in progress.
    pub fn resolve_channel(
        &self,
        name: &str,
        host: Option<&str>,
        resolution: Resolution,
    ) -> Result<Option<Arc<Channel>>, ChannelError> {
        let name = normalize_name(name);
        let full_name = full_channel_name(&name, host);

        let (channel, handler) = {
            let mut state = self.shared.state.lock();
            if let Some(existing) = state.channels.get(&full_name) {
                return Ok(Some(Arc::clone(existing)));
            }

            let handler = state.registry.resolve(&full_name);
            if resolution == Resolution::Auto && handler.is_none() {
                tracing::debug!(full_name = %full_name, "No rule matches channel");
                metrics::record_channel_rejected("routing_miss");
                return Ok(None);
            }

            let retirement = match resolution {
                Resolution::Auto => handler
                    .as_ref()
                    .and_then(|(handler, _)| handler.retirement)
                    .unwrap_or(self.shared.default_retirement),
                Resolution::Explicit => Retirement::Never,
            };
            let channel = Channel::new(
                name,
                host.map(str::to_string),
                retirement,
                Arc::downgrade(&self.shared),
            );
            if handler.is_some() {
                channel.set_setup_state(SetupState::InProgress);
            }
            state.channels.insert(full_name.clone(), Arc::clone(&channel));
            metrics::record_channel_created(resolution.label());
            metrics::set_active_channels(state.channels.len());
            (channel, handler)
        };

        tracing::info!(
            full_name = %full_name,
            origin = resolution.label(),
            retirement = ?channel.retirement(),
            "Channel created"
        );

        let Some((handler, info)) = handler else {
            return Ok(Some(channel));
        };

        match (handler.init)(&channel, &info) {
            Ok(Setup::Accept) => {
                channel.set_setup_state(SetupState::Accepted);
                Ok(Some(channel))
            }
            Ok(Setup::Reject) => {
                let closed = {
                    let mut state = self.shared.state.lock();
                    let closed = channel.close_rejected();
                    if closed && state.channels.get(&full_name).is_some_and(|c| Arc::ptr_eq(c, &channel)) {
                        state.channels.remove(&full_name);
                    }
                    metrics::set_active_channels(state.channels.len());
                    closed
                };
                if closed {
                    tracing::debug!(full_name = %full_name, "Init callback rejected channel");
                } else {
                    // Another resolver attached while init ran; the channel is live.
                    tracing::warn!(full_name = %full_name, "Init callback rejected a channel already in use");
                }
                metrics::record_channel_rejected("init_rejected");
                Ok(None)
            }
            Err(source) => {
                tracing::error!(full_name = %full_name, error = %source, "Init callback failed");
                Err(ChannelError::InitFailed { channel: full_name, source })
            }
        }
    }

    /// Explicitly create (or fetch) a channel.
    pub fn of(&self, name: &str, host: Option<&str>) -> Result<Option<Arc<Channel>>, ChannelError> {
        self.resolve_channel(name, host, Resolution::Explicit)
    }

    /// Explicitly create (or fetch) a channel and subscribe a connect listener.
    /// An existing channel is never initialized a second time.
    pub fn of_with_listener<F>(
        &self,
        name: &str,
        host: Option<&str>,
        listener: F,
    ) -> Result<Option<Arc<Channel>>, ChannelError>
    where
        F: Fn(&Arc<Channel>, &Arc<dyn Connection>) + Send + Sync + 'static,
    {
        let channel = self.of(name, host)?;
        if let Some(channel) = &channel {
            channel.on_connect(listener);
        }
        Ok(channel)
    }

    /// Onboard a new connection: work out its host and attach it to its
    /// default channel `/`.
    pub fn on_connection_arrived(&self, connection: Arc<dyn Connection>) -> Result<Session, ChannelError> {
        let mut session = Session::new(self.clone(), connection);
        session.start()?;
        Ok(session)
    }

    pub fn get(&self, full_name: &str) -> Option<Arc<Channel>> {
        self.shared.state.lock().channels.get(full_name).cloned()
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.shared.state.lock().channels.contains_key(full_name)
    }

    /// The host-agnostic default channel `/`, unless an init rejected it.
    pub fn default_channel(&self) -> Option<Arc<Channel>> {
        self.get("/")
    }

    /// Snapshot of every live channel.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.shared.state.lock().channels.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nominal deadline of the pending sweep timer.
    pub fn pending_cleanup(&self) -> Option<Instant> {
        self.shared.state.lock().timer.pending_deadline()
    }

    /// Ask for a sweep after `delay`. At most one timer is ever pending; it
    /// is replaced only by a sooner deadline.
    pub fn request_cleanup_after(&self, delay: Retirement) -> CleanupRequest {
        let mut state = self.shared.state.lock();
        self.request_cleanup_locked(&mut state, delay)
    }

    fn request_cleanup_locked(&self, state: &mut DirectoryState, delay: Retirement) -> CleanupRequest {
        let outcome = state.timer.request(delay, Instant::now(), |wait, generation| {
            spawn_timer(Arc::downgrade(&self.shared), wait, generation)
        });
        match outcome {
            CleanupRequest::Armed | CleanupRequest::Replaced => {
                tracing::trace!(outcome = ?outcome, delay = ?delay, "Cleanup timer armed");
            }
            CleanupRequest::Unavailable => {
                tracing::warn!(delay = ?delay, "No async runtime, cleanup timer not armed");
            }
            CleanupRequest::Unchanged => {}
        }
        outcome
    }

    fn on_timer(&self, generation: u64) {
        if !self.shared.state.lock().timer.fire(generation) {
            return;
        }
        let report = self.sweep();
        for fault in &report.faults {
            tracing::warn!(error = %fault, "Expire callback fault during timed sweep");
        }
    }

    /// Evict every channel past its deadline and arm the next sweep.
    pub fn sweep(&self) -> SweepReport {
        let started = std::time::Instant::now();
        let now = Instant::now();
        let mut evicted = Vec::new();
        let mut earliest: Option<Instant> = None;

        let next_sweep = {
            let mut state = self.shared.state.lock();
            state.channels.retain(|_, channel| match channel.sweep(now) {
                SweepOutcome::Expired(callbacks) => {
                    evicted.push((Arc::clone(channel), callbacks));
                    false
                }
                SweepOutcome::Pending(deadline) => {
                    earliest = Some(earliest.map_or(deadline, |e| e.min(deadline)));
                    true
                }
                SweepOutcome::Live => true,
            });
            let next = earliest.map_or(Retirement::Never, |deadline| {
                Retirement::After(deadline.saturating_duration_since(now))
            });
            self.request_cleanup_locked(&mut state, next);
            metrics::set_active_channels(state.channels.len());
            state.timer.pending_deadline()
        };

        let mut report = SweepReport {
            next_sweep,
            ..SweepReport::default()
        };
        for (channel, callbacks) in evicted {
            tracing::info!(full_name = %channel.full_name(), "Channel expired");
            metrics::record_channel_expired();
            for callback in callbacks {
                if let Err(source) = callback(&channel) {
                    tracing::error!(full_name = %channel.full_name(), error = %source, "Expire callback failed");
                    metrics::record_expire_fault();
                    report.faults.push(ChannelError::ExpireFailed {
                        channel: channel.full_name().to_string(),
                        source,
                    });
                }
            }
            report.expired.push(channel.full_name().to_string());
        }

        metrics::record_sweep(started.elapsed());
        tracing::debug!(
            expired = report.expired.len(),
            faults = report.faults.len(),
            next_sweep = ?report.next_sweep.map(|d| d.saturating_duration_since(now)),
            "Sweep finished"
        );
        report
    }

    /// Cancel the pending timer. Channels stay in place.
    pub fn shutdown(&self) {
        self.shared.state.lock().timer.cancel();
    }
}

fn spawn_timer(shared: Weak<Shared>, wait: Duration, generation: u64) -> Option<AbortHandle> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    let task = handle.spawn(async move {
        tokio::time::sleep(wait).await;
        if let Some(shared) = shared.upgrade() {
            ChannelDirectory::from_shared(shared).on_timer(generation);
        }
    });
    Some(task.abort_handle())
}
