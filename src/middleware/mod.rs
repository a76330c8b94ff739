//! HTTP middleware for axum routers.
//!
//! Each middleware has a serde config section under `[middleware]`. Response-side
//! concerns (CORS, gzip, body limit) are tower-http layers; the rest are axum
//! `from_fn_with_state` functions. Trailing slash and method override rewrite the
//! request and therefore wrap the router instead of being route layers.

pub mod basic_auth;
pub mod body_limit;
pub mod compress;
pub mod cors;
pub mod ip;
pub mod method_override;
pub mod secure;
pub mod slash;
pub mod static_files;
pub mod validation;

use thiserror::Error;

pub use ip::{extract_ip_from_headers, AllowIp, MaybeRemoteAddr};

#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("invalid {section} config: {message}")]
    InvalidConfig { section: &'static str, message: String },
}

impl MiddlewareError {
    pub(crate) fn invalid(section: &'static str, message: impl Into<String>) -> Self {
        MiddlewareError::InvalidConfig { section, message: message.into() }
    }
}
