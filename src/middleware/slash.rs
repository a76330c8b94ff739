use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlashMode {
    #[default]
    None,
    Add,
    Remove,
}

/// Trailing slash normalization, applied before routing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TrailingSlashConfig {
    pub mode: SlashMode,
    /// Answer with this redirect status instead of rewriting the request.
    pub redirect_code: Option<u16>,
}

/// Rewritten path, or `None` when the path is already in shape. `/` is never touched.
pub fn normalize_path(path: &str, mode: SlashMode) -> Option<String> {
    if path == "/" {
        return None;
    }
    match mode {
        SlashMode::Add if !path.ends_with('/') => Some(format!("{}/", path)),
        SlashMode::Remove if path.ends_with('/') => Some(path[..path.len() - 1].to_string()),
        _ => None,
    }
}

fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(q) => format!("{}?{}", path, q),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}

/// For `Router::map_request_with_state` style wrapping of the whole app.
pub async fn trailing_slash(State(cfg): State<TrailingSlashConfig>, mut req: Request) -> Result<Request, Response> {
    let Some(path) = normalize_path(req.uri().path(), cfg.mode) else {
        return Ok(req);
    };
    let Some(uri) = with_path(req.uri(), &path) else {
        return Ok(req);
    };

    if let Some(code) = cfg.redirect_code {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::MOVED_PERMANENTLY);
        let location = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(path.as_str());
        let mut res = status.into_response();
        if let Ok(value) = HeaderValue::from_str(location) {
            res.headers_mut().insert(header::LOCATION, value);
        }
        return Err(res);
    }

    *req.uri_mut() = uri;
    Ok(req)
}
