use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BasicAuthConfig {
    pub enabled: bool,
    /// user -> password
    pub users: HashMap<String, String>,
}

type Validator = dyn Fn(&str, &str) -> bool + Send + Sync;

/// Credential check shared by every request.
#[derive(Clone)]
pub struct BasicAuth {
    validator: Arc<Validator>,
}

impl BasicAuth {
    pub fn new<F>(validator: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self { validator: Arc::new(validator) }
    }

    pub fn from_config(cfg: &BasicAuthConfig) -> Self {
        let users = cfg.users.clone();
        Self::new(move |user, password| users.get(user).is_some_and(|expected| constant_time_eq(expected, password)))
    }

    fn check(&self, user: &str, password: &str) -> bool {
        (self.validator)(user, password)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

fn unauthorized() -> Response {
    let mut res = StatusCode::UNAUTHORIZED.into_response();
    res.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=Restricted"));
    res
}

/// `Authorization: Basic <base64(user:password)>`.
///
/// Missing or rejected credentials get 401 with a `WWW-Authenticate` challenge;
/// a payload that is not valid base64 gets 400.
pub async fn basic_auth(State(auth): State<BasicAuth>, req: Request, next: Next) -> Response {
    let encoded = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Basic "))
        .map(str::trim);

    let Some(encoded) = encoded.filter(|e| !e.is_empty()) else {
        return unauthorized();
    };
    let decoded = match STANDARD.decode(encoded) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::debug!("Undecodable basic auth header: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    match decoded.split_once(':') {
        Some((user, password)) if auth.check(user, password) => next.run(req).await,
        _ => unauthorized(),
    }
}
