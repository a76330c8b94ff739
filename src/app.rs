//! Assembles the HTTP application: routes, swagger and the configured middleware.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn_with_state, map_request_with_state};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::{
    basic_auth::{basic_auth, BasicAuth},
    ip::allow_ip,
    method_override::method_override,
    secure::{secure_headers, SecureHeaders},
    slash::trailing_slash,
    static_files::static_files,
    AllowIp,
};
use crate::routes;
use crate::state::AppState;
use crate::swagger::{self, ApiDoc};

/// Builds the complete router.
///
/// Layers run outermost first: CORS, tracing, gzip, body limit, secure headers,
/// IP allowlist, basic auth, static files, then the routes. Trailing slash and
/// method override rewrite the request before routing.
pub fn build_app(state: AppState, apidoc: Option<Arc<ApiDoc>>) -> anyhow::Result<Router> {
    let cfg = state.config.clone();
    let mw = &cfg.middleware;

    let mut app = routes::api_router(state);
    if let Some(doc) = apidoc {
        app = app.merge(swagger::router(doc, &cfg.apidoc));
    }

    if mw.static_files.enabled {
        info!("Serving static files from {}", mw.static_files.root);
        app = app.layer(from_fn_with_state(Arc::new(mw.static_files.clone()), static_files));
    }
    if mw.basic_auth.enabled {
        app = app.layer(from_fn_with_state(BasicAuth::from_config(&mw.basic_auth), basic_auth));
    }
    if mw.allow_ip.enabled {
        app = app.layer(from_fn_with_state(AllowIp::from_config(&mw.allow_ip), allow_ip));
    }
    if mw.secure.enabled {
        let secure = SecureHeaders { config: mw.secure.clone(), tls: cfg.server.tls };
        app = app.layer(from_fn_with_state(secure, secure_headers));
    }
    if mw.body_limit.enabled {
        app = app.layer(DefaultBodyLimit::disable()).layer(mw.body_limit.layer()?);
    }
    if mw.gzip.enabled {
        app = app.layer(mw.gzip.layer());
    }
    app = app.layer(TraceLayer::new_for_http());
    if mw.cors.enabled {
        app = app.layer(mw.cors.layer()?);
    }

    // Pre-routing rewrites: the inner router only sees the rewritten request.
    Ok(Router::new()
        .fallback_service(app)
        .layer(map_request_with_state(mw.method_override.clone(), method_override))
        .layer(map_request_with_state(mw.trailing_slash.clone(), trailing_slash)))
}
