//! Turns the `[namespaces]` section into a configured directory.

use std::sync::Arc;

use crate::config::schema::{HostRuleConfig, NamespaceConfig, RuleConfig};
use crate::namespace::{Channel, ChannelDirectory, ChannelError, DirectoryOptions, Retirement};
use crate::routing::{HostRule, MatchInfo, NameRule, Setup, StandardNormalizer};

impl HostRuleConfig {
    /// Compile into a [`HostRule`]. Patterns were checked by validation,
    /// but compile errors still surface here.
    pub fn to_rule(&self) -> Result<HostRule, regex::Error> {
        Ok(match self {
            HostRuleConfig::Any => HostRule::Any,
            HostRuleConfig::None => HostRule::None,
            HostRuleConfig::Exact(host) => HostRule::exact(host),
            HostRuleConfig::Pattern(pattern) => HostRule::pattern(pattern)?,
        })
    }
}

impl RuleConfig {
    pub fn to_rule(&self) -> Result<NameRule, regex::Error> {
        match (&self.name, &self.pattern) {
            (_, Some(pattern)) => NameRule::pattern(pattern),
            (Some(name), None) => Ok(NameRule::from(name.as_str())),
            (None, None) => Ok(NameRule::any()),
        }
    }
}

impl NamespaceConfig {
    pub fn directory_options(&self) -> Result<DirectoryOptions, regex::Error> {
        Ok(DirectoryOptions::default()
            .with_main_host(self.main_host.to_rule()?)
            .with_normalizer(Arc::new(StandardNormalizer::new(self.strip_port)))
            .with_retirement(Retirement::from_millis(self.retirement_ms)))
    }

    /// Build a directory, register every rule and create the permanent channels.
    pub fn build_directory(&self) -> Result<ChannelDirectory, NamespaceSetupError> {
        let directory = ChannelDirectory::new(self.directory_options()?);
        for name in &self.permanent {
            directory.of(name, None)?;
        }
        for rule in &self.rules {
            let accept = rule.accept;
            let init = move |_: &Arc<Channel>, _: &MatchInfo| Ok(Setup::from(accept));
            match rule.retirement_ms {
                Some(ms) => directory.register_rule_with_retirement(rule.to_rule()?, Retirement::from_millis(ms), init)?,
                None => directory.register_rule(rule.to_rule()?, init)?,
            }
        }
        tracing::info!(
            rules = self.rules.len(),
            permanent = self.permanent.len(),
            main_host = ?self.main_host,
            "Channel directory configured"
        );
        Ok(directory)
    }
}

/// Failure turning configuration into a live directory.
#[derive(Debug, thiserror::Error)]
pub enum NamespaceSetupError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
