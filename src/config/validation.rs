//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and addresses
//! - Check that every pattern compiles and every rule is well formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use regex::Regex;

use crate::config::schema::{HostRuleConfig, ServerConfig};

/// One semantic problem, located by its config path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    match &config.namespaces.main_host {
        HostRuleConfig::Exact(host) if host.trim().is_empty() => {
            errors.push(ValidationError::new("namespaces.main_host", "exact host must not be empty"));
        }
        HostRuleConfig::Pattern(pattern) => {
            if let Err(e) = Regex::new(pattern) {
                errors.push(ValidationError::new("namespaces.main_host", e.to_string()));
            }
        }
        _ => {}
    }

    for (i, name) in config.namespaces.permanent.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(format!("namespaces.permanent[{}]", i), "name must not be empty"));
        }
    }

    for (i, rule) in config.namespaces.rules.iter().enumerate() {
        let field = format!("namespaces.rules[{}]", i);
        match (&rule.name, &rule.pattern) {
            (Some(_), Some(_)) => errors.push(ValidationError::new(field, "set either name or pattern, not both")),
            (None, None) => errors.push(ValidationError::new(field, "one of name or pattern is required")),
            (Some(name), None) if name.trim().is_empty() => {
                errors.push(ValidationError::new(field, "name must not be empty"))
            }
            (None, Some(pattern)) => {
                if let Err(e) = Regex::new(pattern) {
                    errors.push(ValidationError::new(field, e.to_string()));
                }
            }
            _ => {}
        }
    }

    if config.observability.metrics_enabled && config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RuleConfig;

    fn rule(name: Option<&str>, pattern: Option<&str>) -> RuleConfig {
        RuleConfig {
            name: name.map(str::to_string),
            pattern: pattern.map(str::to_string),
            accept: true,
            retirement_ms: None,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.listener.max_connections = 0;
        config.namespaces.main_host = HostRuleConfig::Pattern("(".to_string());
        config.namespaces.rules = vec![
            rule(Some("/a"), Some("^/a")),
            rule(None, None),
            rule(None, Some("[")),
            rule(Some("/ok"), None),
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "listener.max_connections",
                "namespaces.main_host",
                "namespaces.rules[0]",
                "namespaces.rules[1]",
                "namespaces.rules[2]",
            ]
        );
    }

    #[test]
    fn empty_exact_main_host_is_rejected() {
        let mut config = ServerConfig::default();
        config.namespaces.main_host = HostRuleConfig::Exact("  ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "namespaces.main_host");
    }
}
