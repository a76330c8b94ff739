//! API documentation: `/swagger.json` generated from an [`ApiNode`] tree and a
//! swagger-ui installation served under `/apidoc/`.

pub mod document;
pub mod generator;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path as UrlPath, Request, State},
    http::{header, HeaderMap},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;

use crate::config::{ApiDocConfig, AppInfoConfig};
use crate::copyfiles;
use crate::error::{AppError, AppResult};
use crate::middleware::{ip::allow_ip, validation::contains_path_traversal, AllowIp};

pub use document::Swagger;
pub use generator::{build_swagger, ApiNode, ApiParam};

pub const JSON_URL: &str = "/swagger.json";
const JSON_URL_PLACEHOLDER: &str = "{{{JSON_URL}}}";

struct Cached {
    version: u64,
    doc: Swagger,
}

/// Shared documentation state. The document is built on first request and rebuilt
/// only after the tree changes.
pub struct ApiDoc {
    info: AppInfoConfig,
    scheme: &'static str,
    ui_dir: PathBuf,
    tree: RwLock<(u64, ApiNode)>,
    cache: RwLock<Option<Cached>>,
}

impl ApiDoc {
    pub fn new(tree: ApiNode, info: AppInfoConfig, tls: bool, ui_dir: impl Into<PathBuf>) -> Self {
        Self {
            info,
            scheme: if tls { "https" } else { "http" },
            ui_dir: ui_dir.into(),
            tree: RwLock::new((1, tree)),
            cache: RwLock::new(None),
        }
    }

    pub fn set_tree(&self, tree: ApiNode) {
        let mut guard = self.tree.write().unwrap_or_else(|e| e.into_inner());
        *guard = (guard.0 + 1, tree);
    }

    /// The document for `host`.
    pub fn document(&self, host: &str) -> Swagger {
        let tree = self.tree.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = self.cache.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            if cached.version == tree.0 {
                let mut doc = cached.doc.clone();
                doc.host = host.to_string();
                return doc;
            }
        }
        let doc = build_swagger(&tree.1, &self.info, host, self.scheme);
        info!("Swagger document rebuilt (tree version {})", tree.0);
        *self.cache.write().unwrap_or_else(|e| e.into_inner()) = Some(Cached { version: tree.0, doc: doc.clone() });
        doc
    }
}

async fn swagger_json(State(doc): State<Arc<ApiDoc>>, headers: HeaderMap) -> Json<Swagger> {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok()).unwrap_or("localhost");
    Json(doc.document(host))
}

async fn apidoc_index() -> Redirect {
    Redirect::to("/apidoc/index.html")
}

async fn apidoc_file(State(doc): State<Arc<ApiDoc>>, UrlPath(file): UrlPath<String>, req: Request) -> AppResult<Response> {
    if contains_path_traversal(&file) || file.starts_with('/') {
        return Err(AppError::BadRequest("Path traversal detected in request".to_string()));
    }
    let path = doc.ui_dir.join(&file);
    if !path.is_file() {
        return Err(AppError::NotFound(format!("apidoc file {}", file)));
    }
    match ServeFile::new(path).oneshot(req).await {
        Ok(res) => Ok(res.map(axum::body::Body::new).into_response()),
        Err(never) => match never {},
    }
}

/// Routes for `/swagger.json` and `/apidoc/`. Without `allow_wan` they only answer
/// LAN clients.
pub fn router(doc: Arc<ApiDoc>, cfg: &ApiDocConfig) -> Router {
    let routes = Router::new()
        .route(JSON_URL, get(swagger_json))
        .route("/apidoc", get(apidoc_index))
        .route("/apidoc/", get(apidoc_index))
        .route("/apidoc/{*file}", get(apidoc_file))
        .with_state(doc);
    if cfg.allow_wan {
        info!("Swagger API doc can be accessed from \"/apidoc\"");
        routes
    } else {
        info!("Swagger API doc can be accessed from \"/apidoc\", but only allows LAN");
        routes.route_layer(middleware::from_fn_with_state(AllowIp::lan_only(), allow_ip))
    }
}

/// Copies swagger-ui into `ui_dir` unless it already exists, pointing its
/// `index.html` at [`JSON_URL`]. Returns the number of files written.
pub fn install_ui(source: &Path, ui_dir: &Path) -> std::io::Result<usize> {
    if ui_dir.exists() {
        return Ok(0);
    }
    copyfiles::copy_files(source, ui_dir, "", |name, bytes| {
        if name == "index.html" {
            String::from_utf8_lossy(&bytes).replace(JSON_URL_PLACEHOLDER, JSON_URL).into_bytes()
        } else {
            bytes
        }
    })
}
