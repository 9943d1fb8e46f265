//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the channel server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Channel directory settings and rules.
    pub namespaces: NamespaceConfig,

    /// Status endpoint exposure.
    pub status: StatusConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum concurrent WebSocket connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Host rule as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HostRuleConfig {
    /// Every host is the main host.
    #[default]
    Any,
    /// Only connections without a host are on the main host.
    None,
    Exact(String),
    /// Regular expression matched against the whole normalized host.
    Pattern(String),
}

/// Channel directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NamespaceConfig {
    pub main_host: HostRuleConfig,

    /// Retirement of auto-created channels, in milliseconds.
    pub retirement_ms: u64,

    /// Strip a trailing `:port` from hosts before matching.
    pub strip_port: bool,

    /// Channels created at startup that never expire.
    pub permanent: Vec<String>,

    /// Name rules, registered in order (later patterns take priority).
    pub rules: Vec<RuleConfig>,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            main_host: HostRuleConfig::Any,
            retirement_ms: 10_000,
            strip_port: false,
            permanent: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// One name rule. Exactly one of `name` and `pattern` must be set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Exact full channel name, or `*` for every name.
    #[serde(default)]
    pub name: Option<String>,

    /// Regular expression searched in the full channel name.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Whether matching channels are accepted or rejected by their init.
    #[serde(default = "default_accept")]
    pub accept: bool,

    /// Override of the directory retirement for channels this rule creates.
    #[serde(default)]
    pub retirement_ms: Option<u64>,
}

fn default_accept() -> bool {
    true
}

/// Status endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StatusConfig {
    /// Serve `GET /status`.
    pub public: bool,

    /// Bearer token required by `/status` when set.
    pub api_key: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
