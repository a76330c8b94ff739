use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverrideGetter {
    #[default]
    Header,
    Query,
    Form,
}

/// Lets clients limited to POST tunnel other methods.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MethodOverrideConfig {
    pub enabled: bool,
    pub getter: OverrideGetter,
    /// Header, query parameter or form field carrying the method.
    pub name: String,
}

impl Default for MethodOverrideConfig {
    fn default() -> Self {
        Self { enabled: false, getter: OverrideGetter::Header, name: "X-HTTP-Method-Override".to_string() }
    }
}

// Form bodies are buffered to read the field; anything larger is left alone.
const MAX_FORM_BYTES: usize = 1 << 20;

fn lookup(pairs: Vec<(String, String)>, name: &str) -> Option<String> {
    pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

async fn override_value(cfg: &MethodOverrideConfig, req: Request) -> Result<(Request, Option<String>), Response> {
    match cfg.getter {
        OverrideGetter::Header => {
            let value = req.headers().get(cfg.name.as_str()).and_then(|v| v.to_str().ok()).map(str::to_string);
            Ok((req, value))
        }
        OverrideGetter::Query => {
            let pairs = req
                .uri()
                .query()
                .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
                .unwrap_or_default();
            Ok((req, lookup(pairs, &cfg.name)))
        }
        OverrideGetter::Form => {
            let is_form = req
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
            if !is_form {
                return Ok((req, None));
            }
            let (parts, body) = req.into_parts();
            let bytes = to_bytes(body, MAX_FORM_BYTES)
                .await
                .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE.into_response())?;
            let value = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
                .ok()
                .and_then(|pairs| lookup(pairs, &cfg.name));
            Ok((Request::from_parts(parts, Body::from(bytes)), value))
        }
    }
}

/// Replaces the method of a POST request with the overriding one, before routing.
pub async fn method_override(State(cfg): State<MethodOverrideConfig>, req: Request) -> Result<Request, Response> {
    if !cfg.enabled || req.method() != Method::POST {
        return Ok(req);
    }
    let (mut req, value) = override_value(&cfg, req).await?;
    if let Some(value) = value.map(|v| v.trim().to_ascii_uppercase()).filter(|v| !v.is_empty()) {
        match Method::from_bytes(value.as_bytes()) {
            Ok(method) => {
                tracing::debug!("Method override: POST -> {}", method);
                *req.method_mut() = method;
            }
            Err(_) => tracing::debug!("Ignoring invalid override method '{}'", value),
        }
    }
    Ok(req)
}
