//! Dynamic channel ("namespace") server library.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod namespace;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use namespace::{Channel, ChannelDirectory, DirectoryOptions, Resolution};
