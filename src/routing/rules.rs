//! Channel name rules and the pattern registry.
//!
//! # Responsibilities
//! - Store exact-name handlers and pattern handlers
//! - Resolve a full channel name to at most one handler
//! - Report captured groups to the handler as [`MatchInfo`]
//!
//! # Design Decisions
//! - Exact names always beat patterns
//! - Patterns are scanned newest first: a later registration overrides an
//!   earlier, more general one
//! - Patterns search the name like `Regex::captures` does; anchor them
//!   explicitly when a full match is wanted
//! - Rules are append-only, nothing is ever unregistered

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::namespace::{BoxError, Channel, Retirement};

/// Outcome of a channel init callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setup {
    /// Keep the channel.
    Accept,
    /// Roll the channel back out of the directory.
    Reject,
}

impl From<bool> for Setup {
    fn from(accept: bool) -> Self {
        if accept {
            Setup::Accept
        } else {
            Setup::Reject
        }
    }
}

impl From<()> for Setup {
    fn from(_: ()) -> Self {
        Setup::Accept
    }
}

/// Init callback invoked once per channel, with the rule's match details.
pub type InitFn = Arc<dyn Fn(&Arc<Channel>, &MatchInfo) -> Result<Setup, BoxError> + Send + Sync>;

/// A registered init callback plus the retirement it grants to channels it
/// auto-creates (`None` means the directory default).
#[derive(Clone)]
pub struct Handler {
    pub init: InitFn,
    pub retirement: Option<Retirement>,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("retirement", &self.retirement)
            .finish_non_exhaustive()
    }
}

/// Which channel names a handler applies to.
#[derive(Debug, Clone)]
pub enum NameRule {
    /// Exact full channel name.
    Exact(String),
    /// Pattern searched within the full channel name.
    Pattern(Regex),
}

impl NameRule {
    pub fn exact(name: impl Into<String>) -> Self {
        NameRule::Exact(name.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(NameRule::Pattern(Regex::new(pattern)?))
    }

    /// Catch-all rule.
    pub fn any() -> Self {
        NameRule::Pattern(Regex::new(".*").expect("literal pattern is valid"))
    }

    /// Match this rule against a full channel name.
    pub fn matches(&self, full_name: &str) -> Option<MatchInfo> {
        match self {
            NameRule::Exact(name) if name == full_name => Some(MatchInfo::exact(full_name)),
            NameRule::Exact(_) => None,
            NameRule::Pattern(pattern) => MatchInfo::capture(pattern, full_name),
        }
    }
}

impl From<&str> for NameRule {
    /// `*` is the catch-all pattern, every other string an exact name.
    fn from(spec: &str) -> Self {
        if spec == "*" {
            NameRule::any()
        } else {
            NameRule::exact(spec)
        }
    }
}

impl From<String> for NameRule {
    fn from(spec: String) -> Self {
        NameRule::from(spec.as_str())
    }
}

impl From<Regex> for NameRule {
    fn from(pattern: Regex) -> Self {
        NameRule::Pattern(pattern)
    }
}

/// Details of how a name rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    /// Group 0: the matched substring.
    pub matched: String,
    /// Byte offset of the match within `input`.
    pub index: usize,
    /// The full channel name that was matched.
    pub input: String,
    /// Numbered groups 1.., `None` where a group did not participate.
    pub groups: Vec<Option<String>>,
    /// Named groups that participated.
    pub named: BTreeMap<String, String>,
}

impl MatchInfo {
    /// Match info for an exact-name hit: the whole input, no groups.
    pub fn exact(input: &str) -> Self {
        Self {
            matched: input.to_string(),
            index: 0,
            input: input.to_string(),
            groups: Vec::new(),
            named: BTreeMap::new(),
        }
    }

    fn capture(pattern: &Regex, input: &str) -> Option<Self> {
        let caps = pattern.captures(input)?;
        let whole = caps.get(0)?;
        let groups = caps
            .iter()
            .skip(1)
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();
        let named = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();
        Some(Self {
            matched: whole.as_str().to_string(),
            index: whole.start(),
            input: input.to_string(),
            groups,
            named,
        })
    }

    /// Group by number; 0 is the whole match.
    pub fn get(&self, index: usize) -> Option<&str> {
        match index {
            0 => Some(&self.matched),
            n => self.groups.get(n - 1).and_then(|g| g.as_deref()),
        }
    }

    /// Named group, if it participated.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

/// Registered name rules.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    exact: HashMap<String, Handler>,
    patterns: Vec<(Regex, Handler)>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. Exact names overwrite a previous handler for the same name;
    /// patterns are appended.
    pub fn register(&mut self, rule: NameRule, handler: Handler) {
        match rule {
            NameRule::Exact(name) => {
                self.exact.insert(name, handler);
            }
            NameRule::Pattern(pattern) => self.patterns.push((pattern, handler)),
        }
    }

    /// Find the handler for `full_name`: exact first, then patterns newest first.
    pub fn resolve(&self, full_name: &str) -> Option<(Handler, MatchInfo)> {
        if let Some(handler) = self.exact.get(full_name) {
            return Some((handler.clone(), MatchInfo::exact(full_name)));
        }
        self.patterns.iter().rev().find_map(|(pattern, handler)| {
            MatchInfo::capture(pattern, full_name).map(|info| (handler.clone(), info))
        })
    }

    /// Number of registered rules (exact and pattern).
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: &'static str) -> Handler {
        Handler {
            init: Arc::new(move |_, _| Err(tag.into())),
            retirement: None,
        }
    }

    fn tag_of(handler: &Handler) -> String {
        let channel = Channel::detached("/probe");
        match (handler.init)(&channel, &MatchInfo::exact("/probe")) {
            Err(e) => e.to_string(),
            Ok(_) => String::new(),
        }
    }

    #[test]
    fn exact_beats_pattern() {
        let mut registry = PatternRegistry::new();
        registry.register(NameRule::exact("/a"), tagged("exact"));
        registry.register(NameRule::pattern("^/a$").unwrap(), tagged("pattern"));

        let (handler, info) = registry.resolve("/a").unwrap();
        assert_eq!(tag_of(&handler), "exact");
        assert_eq!(info, MatchInfo::exact("/a"));
    }

    #[test]
    fn newest_pattern_wins() {
        let mut registry = PatternRegistry::new();
        registry.register(NameRule::pattern(r"^/special.*$").unwrap(), tagged("wc1"));
        registry.register(NameRule::pattern(r"^/.*debug$").unwrap(), tagged("wc2"));

        let resolve = |name: &str| registry.resolve(name).map(|(h, _)| tag_of(&h));
        assert_eq!(resolve("/special-other").as_deref(), Some("wc1"));
        assert_eq!(resolve("/other-debug").as_deref(), Some("wc2"));
        assert_eq!(resolve("/special-other-debug").as_deref(), Some("wc2"));
        assert_eq!(resolve("/no-match"), None);
    }

    #[test]
    fn later_exact_overwrites() {
        let mut registry = PatternRegistry::new();
        registry.register(NameRule::exact("/special-debug"), tagged("ex1"));
        registry.register(NameRule::exact("/special-debug"), tagged("ex2"));

        let (handler, _) = registry.resolve("/special-debug").unwrap();
        assert_eq!(tag_of(&handler), "ex2");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn match_info_carries_groups() {
        let rule = NameRule::pattern(r"^/dyn/(?P<room>[^/]*)(/x)?$").unwrap();
        let info = rule.matches("/dyn/a").unwrap();

        assert_eq!(info.get(0), Some("/dyn/a"));
        assert_eq!(info.get(1), Some("a"));
        assert_eq!(info.get(2), None);
        assert_eq!(info.name("room"), Some("a"));
        assert_eq!(info.input, "/dyn/a");
        assert_eq!(info.index, 0);
    }

    #[test]
    fn pattern_reports_substring_match() {
        let rule = NameRule::pattern("sec").unwrap();
        let info = rule.matches("/d/sec").unwrap();
        assert_eq!(info.matched, "sec");
        assert_eq!(info.index, 3);
    }

    #[test]
    fn star_is_catch_all() {
        let rule = NameRule::from("*");
        assert_eq!(rule.matches("/").unwrap().matched, "/");
        assert!(matches!(NameRule::from("/x"), NameRule::Exact(_)));
    }
}
