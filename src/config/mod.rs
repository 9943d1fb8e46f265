//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → namespaces.rs (directory options, rules, permanent channels)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod namespaces;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use namespaces::NamespaceSetupError;
pub use schema::{HostRuleConfig, ListenerConfig, NamespaceConfig, RuleConfig, ServerConfig, StatusConfig};
