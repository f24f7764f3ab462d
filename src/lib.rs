//! # M2M Token Library
//!
//! Obtains machine-to-machine access tokens from an OAuth2
//! client-credentials endpoint, caches the token in memory and refreshes
//! it when it gets old or close to expiry. Concurrent callers share one
//! refresh; a failed refresh falls back to the cached token while it is
//! still valid.
//!
//! Modules:
//! - `cache` — token value, single-slot cell and refresh policy
//! - `sources` — token fetching (client-credentials over HTTP)
//! - `service` — `TokenService`, the entry point for callers
//! - `config` — validated credentials and application config
//! - `server` — HTTP sidecar exposing the token

pub mod cache;
pub mod config;
pub mod error;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod service;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::refresh_policy::RefreshPolicy;
pub use crate::cache::token::Token;
pub use crate::config::service_config::ServiceConfig;
pub use crate::error::TokenError;
pub use crate::service::TokenService;
