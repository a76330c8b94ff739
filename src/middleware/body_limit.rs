use serde::Deserialize;
use tower_http::limit::RequestBodyLimitLayer;

use super::MiddlewareError;
use crate::bitconv;

/// Request body size cap. `limit` is a byte size string such as `4M` or `10MB`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BodyLimitConfig {
    pub enabled: bool,
    pub limit: String,
}

impl Default for BodyLimitConfig {
    fn default() -> Self {
        Self { enabled: true, limit: "10M".to_string() }
    }
}

impl BodyLimitConfig {
    pub fn bytes(&self) -> Result<usize, MiddlewareError> {
        let n = bitconv::parse(&self.limit).map_err(|e| MiddlewareError::invalid("body_limit", e.to_string()))?;
        usize::try_from(n).map_err(|_| MiddlewareError::invalid("body_limit", format!("limit must not be negative: {}", self.limit)))
    }

    /// Oversized requests are answered with 413, whether announced by
    /// `Content-Length` or discovered while reading the body.
    pub fn layer(&self) -> Result<RequestBodyLimitLayer, MiddlewareError> {
        Ok(RequestBodyLimitLayer::new(self.bytes()?))
    }
}
