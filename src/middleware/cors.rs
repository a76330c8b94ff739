use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use serde::Deserialize;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use super::MiddlewareError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// `*` allows any origin.
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    /// Empty echoes the request's `Access-Control-Request-Headers`.
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
    pub expose_headers: Vec<String>,
    /// Seconds; 0 leaves `Access-Control-Max-Age` out.
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origins: vec!["*".to_string()],
            allow_methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"].iter().map(|m| m.to_string()).collect(),
            allow_headers: Vec::new(),
            allow_credentials: false,
            expose_headers: Vec::new(),
            max_age: 0,
        }
    }
}

fn header_names(names: &[String]) -> Result<Vec<HeaderName>, MiddlewareError> {
    names
        .iter()
        .map(|h| HeaderName::from_bytes(h.trim().as_bytes()).map_err(|e| MiddlewareError::invalid("cors", format!("{h}: {e}"))))
        .collect()
}

impl CorsConfig {
    pub fn layer(&self) -> Result<CorsLayer, MiddlewareError> {
        let wildcard = self.allow_origins.is_empty() || self.allow_origins.iter().any(|o| o == "*");
        if wildcard && self.allow_credentials {
            return Err(MiddlewareError::invalid("cors", "allow_credentials cannot be combined with origin '*'"));
        }
        let origins = if wildcard {
            AllowOrigin::any()
        } else {
            let list = self
                .allow_origins
                .iter()
                .map(|o| HeaderValue::from_str(o.trim()).map_err(|e| MiddlewareError::invalid("cors", format!("{o}: {e}"))))
                .collect::<Result<Vec<_>, _>>()?;
            AllowOrigin::list(list)
        };

        let methods = self
            .allow_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|e| MiddlewareError::invalid("cors", format!("{m}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let headers = if self.allow_headers.is_empty() {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::list(header_names(&self.allow_headers)?)
        };

        let mut layer = CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(self.allow_credentials)
            .expose_headers(header_names(&self.expose_headers)?);
        if self.max_age > 0 {
            layer = layer.max_age(Duration::from_secs(self.max_age));
        }
        Ok(layer)
    }
}
