//! Virtual host matching.
//!
//! # Responsibilities
//! - Decide whether a connection's declared host is the server's main host
//! - Normalize raw host strings before comparison (case, IPv6 literals, port)
//!
//! # Design Decisions
//! - Matching never fails: a host that cannot be normalized is compared as-is
//! - Patterns are anchored, so they must cover the whole host string
//! - An empty host string is the same as no host at all

use std::net::Ipv6Addr;

use regex::Regex;

/// Rule describing which hosts count as the server's main host.
#[derive(Debug, Clone, Default)]
pub enum HostRule {
    /// Every host matches, including a missing one.
    #[default]
    Any,
    /// Only the absence of a host matches.
    None,
    /// Exact match against the normalized host.
    Exact(String),
    /// Anchored pattern tested against the normalized host.
    Pattern(Regex),
}

impl HostRule {
    /// Exact host rule. The host is lowercased to line up with normalized input.
    pub fn exact(host: impl Into<String>) -> Self {
        HostRule::Exact(host.into().to_lowercase())
    }

    /// Compile a host pattern that must match the entire host string.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(HostRule::Pattern(Regex::new(&format!("^(?:{})$", pattern))?))
    }

    /// Returns true if `host` satisfies this rule.
    pub fn matches(&self, host: Option<&str>, normalizer: &dyn HostNormalizer) -> bool {
        let host = host.map(str::trim).filter(|h| !h.is_empty());
        match (self, host) {
            (HostRule::Any, _) => true,
            (HostRule::None, host) => host.is_none(),
            (_, None) => false,
            (HostRule::Exact(expected), Some(host)) => normalizer.normalize(host) == *expected,
            (HostRule::Pattern(pattern), Some(host)) => pattern.is_match(&normalizer.normalize(host)),
        }
    }
}

/// Pure, total transform applied to raw host strings before matching.
pub trait HostNormalizer: Send + Sync {
    /// Normalize `host`. Must never fail; worst case return the input unchanged.
    fn normalize(&self, host: &str) -> String;
}

/// Default normalizer.
///
/// Lowercases the host, expands IPv6 literals to their full eight-group form
/// (`[::1]:80` becomes `[0:0:0:0:0:0:0:1]:80`) and optionally drops the port.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNormalizer {
    strip_port: bool,
}

impl StandardNormalizer {
    pub fn new(strip_port: bool) -> Self {
        Self { strip_port }
    }
}

impl HostNormalizer for StandardNormalizer {
    fn normalize(&self, host: &str) -> String {
        let host = host.trim().to_lowercase();

        // Bracketed IPv6 literal, optionally followed by a port.
        if let Some(rest) = host.strip_prefix('[') {
            let Some((addr, tail)) = rest.split_once(']') else {
                return host;
            };
            let Ok(addr) = addr.parse::<Ipv6Addr>() else {
                return host;
            };
            let expanded = expand_ipv6(&addr);
            return match tail.strip_prefix(':') {
                Some(port) if !self.strip_port => format!("[{}]:{}", expanded, port),
                _ => format!("[{}]", expanded),
            };
        }

        // Bare IPv6 literal cannot carry a port.
        if let Ok(addr) = host.parse::<Ipv6Addr>() {
            return expand_ipv6(&addr);
        }

        if self.strip_port {
            if let Some((name, port)) = host.rsplit_once(':') {
                if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
                    return name.to_string();
                }
            }
        }
        host
    }
}

fn expand_ipv6(addr: &Ipv6Addr) -> String {
    addr.segments()
        .iter()
        .map(|s| format!("{:x}", s))
        .collect::<Vec<_>>()
        .join(":")
}
