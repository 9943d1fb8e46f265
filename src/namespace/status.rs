//! Read-only introspection of the directory.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::channel::SetupState;
use super::directory::ChannelDirectory;

/// One channel as seen by a status consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Full name for an unscoped view, local name for a host-scoped one.
    pub name: String,
    pub full_name: String,
    pub host: Option<String>,
    pub connections: Vec<u64>,
    pub setup: SetupState,
    /// Milliseconds until the channel becomes eligible for eviction.
    pub expires_in_ms: Option<u64>,
}

/// Snapshot of the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryStatus {
    /// `*` for the unscoped view, otherwise the host the view is limited to.
    pub scope: String,
    pub channels: Vec<ChannelStatus>,
    pub next_sweep_in_ms: Option<u64>,
}

impl ChannelDirectory {
    /// View for a request arriving on `host`: the main host sees everything,
    /// any other host only sees its own channels.
    pub fn status_for_host(&self, host: Option<&str>) -> DirectoryStatus {
        let scope = self.scoped_host(host);
        self.snapshot(scope.as_deref())
    }

    fn snapshot(&self, scope: Option<&str>) -> DirectoryStatus {
        let now = Instant::now();
        let mut channels: Vec<ChannelStatus> = self
            .channels()
            .into_iter()
            .filter(|channel| scope.is_none() || channel.host() == scope)
            .map(|channel| ChannelStatus {
                name: match scope {
                    Some(_) => channel.name().to_string(),
                    None => channel.full_name().to_string(),
                },
                full_name: channel.full_name().to_string(),
                host: channel.host().map(str::to_string),
                connections: channel.connection_ids().iter().map(|id| id.as_u64()).collect(),
                setup: channel.setup_state(),
                expires_in_ms: channel
                    .expiration()
                    .map(|deadline| deadline.saturating_duration_since(now).as_millis() as u64),
            })
            .collect();
        channels.sort_by(|a, b| path_order(&a.full_name, &b.full_name));

        DirectoryStatus {
            scope: scope.unwrap_or("*").to_string(),
            channels,
            next_sweep_in_ms: self
                .pending_cleanup()
                .map(|deadline| deadline.saturating_duration_since(now).as_millis() as u64),
        }
    }
}

/// Orders names with `/` after every other character: children list after
/// siblings sharing their prefix, host-scoped names after unscoped ones.
fn path_order(a: &str, b: &str) -> Ordering {
    let key = |s: &str| s.chars().map(|c| if c == '/' { char::MAX } else { c }).collect::<Vec<_>>();
    key(a).cmp(&key(b))
}
