//! Security headers for every response.
//!
//! Empty values are not sent. HSTS is only emitted for requests that arrived over
//! TLS, either directly or as reported by a proxy via `X-Forwarded-Proto`.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecureConfig {
    pub enabled: bool,
    /// `X-XSS-Protection`
    pub xss_protection: String,
    /// `X-Content-Type-Options`
    pub content_type_nosniff: String,
    /// `X-Frame-Options`
    pub x_frame_options: String,
    /// `Strict-Transport-Security` max-age in seconds; 0 disables the header.
    pub hsts_max_age: u64,
    pub hsts_exclude_subdomains: bool,
    pub content_security_policy: String,
}

impl Default for SecureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            xss_protection: "1; mode=block".to_string(),
            content_type_nosniff: "nosniff".to_string(),
            x_frame_options: "SAMEORIGIN".to_string(),
            hsts_max_age: 0,
            hsts_exclude_subdomains: false,
            content_security_policy: String::new(),
        }
    }
}

/// Middleware state: the header config plus whether the server itself terminates TLS.
#[derive(Debug, Clone)]
pub struct SecureHeaders {
    pub config: SecureConfig,
    pub tls: bool,
}

fn set(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if value.trim().is_empty() {
        return;
    }
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(e) => tracing::warn!("Invalid value for {}: {}", name, e),
    }
}

pub async fn secure_headers(State(secure): State<SecureHeaders>, req: Request, next: Next) -> Response {
    let https = secure.tls
        || req
            .headers()
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("https"));

    let mut res = next.run(req).await;
    let cfg = &secure.config;
    let headers = res.headers_mut();

    set(headers, "x-xss-protection", &cfg.xss_protection);
    set(headers, "x-content-type-options", &cfg.content_type_nosniff);
    set(headers, "x-frame-options", &cfg.x_frame_options);
    if https && cfg.hsts_max_age != 0 {
        let mut value = format!("max-age={}", cfg.hsts_max_age);
        if !cfg.hsts_exclude_subdomains {
            value.push_str("; includeSubdomains");
        }
        set(headers, "strict-transport-security", &value);
    }
    set(headers, "content-security-policy", &cfg.content_security_policy);

    res
}
