//! Read-only status surface.
//!
//! `GET /status` is mounted by the HTTP server only when `status.public` is
//! set, behind bearer auth when `status.api_key` is configured.

pub mod auth;
pub mod handlers;
