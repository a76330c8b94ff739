//! Static file serving as a middleware: a request that names an existing file or
//! directory under `root` is answered here, anything else falls through to the
//! router.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::validation::contains_path_traversal;
use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub enabled: bool,
    pub root: String,
    /// URL prefix the files are mounted under; empty means `/`.
    pub prefix: String,
    /// Index files searched in order when a directory is requested.
    pub index: Vec<String>,
    /// List directories that have no index file.
    pub browse: bool,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root: "static".to_string(),
            prefix: String::new(),
            index: vec!["index.html".to_string()],
            browse: true,
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// HTML listing: one link per entry, directories highlighted and suffixed with `/`.
pub async fn directory_listing(dir: &Path, url_path: &str) -> std::io::Result<String> {
    let mut entries = Vec::new();
    let mut read = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read.next_entry().await? {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    entries.sort();

    let base = url_path.trim_end_matches('/');
    let mut list = String::new();
    for (name, is_dir) in entries {
        let (name, color) = if is_dir { (format!("{}/", name), "#e91e63") } else { (name, "#212121") };
        let name = escape_html(&name);
        list.push_str(&format!("<p><a href=\"{}/{}\" style=\"color: {};\">{}</a></p>\n", base, name, color, name));
    }
    Ok(list)
}

async fn serve_file(path: PathBuf, req: Request) -> Response {
    match ServeFile::new(path).oneshot(req).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    }
}

async fn find_index(dir: &Path, index: &[String]) -> Option<PathBuf> {
    for name in index {
        let candidate = dir.join(name);
        if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            return Some(candidate);
        }
    }
    None
}

pub async fn static_files(State(cfg): State<Arc<StaticConfig>>, req: Request, next: Next) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return next.run(req).await;
    }
    let url_path = req.uri().path().to_string();
    // The prefix must end on a segment boundary: `/static` mounts `/static/a`, not `/staticx/a`.
    let relative = match url_path.strip_prefix(cfg.prefix.trim_end_matches('/')) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return next.run(req).await,
    };
    if contains_path_traversal(relative) {
        return AppError::BadRequest("Path traversal detected in request".to_string()).into_response();
    }

    let fs_path = Path::new(&cfg.root).join(relative.trim_start_matches('/'));
    let meta = match tokio::fs::metadata(&fs_path).await {
        Ok(meta) => meta,
        Err(_) => return next.run(req).await,
    };
    if meta.is_file() {
        return serve_file(fs_path, req).await;
    }

    if let Some(index) = find_index(&fs_path, &cfg.index).await {
        return serve_file(index, req).await;
    }
    if !cfg.browse {
        return next.run(req).await;
    }
    match directory_listing(&fs_path, &url_path).await {
        Ok(html) => {
            let mut res = html.into_response();
            res.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
            res
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
