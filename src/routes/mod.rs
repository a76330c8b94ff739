//! HTTP route handlers.
//!
//! - `health`: liveness, readiness, metrics and version endpoints
//! - `directsql`: dynamic SQL dispatch and model reload endpoints
//!
//! [`api_router`] wires both; [`api_tree`] describes the same routes for the
//! swagger document.

pub mod directsql;
pub mod health;

use axum::{routing::get, Router};
use serde_json::json;

use crate::config::AppConfig;
use crate::directsql::engine::{BATCH_COMPLEX_OK, BATCH_OK, EXEC_OK};
use crate::state::AppState;
use crate::swagger::{ApiNode, ApiParam};

pub fn api_router(state: AppState) -> Router {
    let sql = &state.config.directsql;
    let mut router = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version));

    if sql.enabled {
        router = router
            .route(
                &format!("{}/{{*path}}", sql.route_prefix),
                get(directsql::directsql_get).post(directsql::directsql_post),
            )
            .route(&format!("{}/reload", sql.admin_prefix), get(directsql::reload_all))
            .route(&format!("{}/reload/{{*model}}", sql.admin_prefix), get(directsql::reload_model))
            .route(&format!("{}/dbs", sql.admin_prefix), get(directsql::list_dbs));
    }
    router.with_state(state)
}

/// Documentation tree for the routes mounted by [`api_router`].
pub fn api_tree(cfg: &AppConfig) -> ApiNode {
    let mut root = ApiNode::root(&cfg.app.description)
        .child(ApiNode::operation("/healthz", "healthz", &["GET"], "Liveness probe"))
        .child(ApiNode::operation("/readyz", "readyz", &["GET"], "Readiness probe\nRuns SELECT 1 on the default database."))
        .child(ApiNode::operation("/metrics", "metrics", &["GET"], "Engine counters as JSON"))
        .child(ApiNode::operation("/metrics/prometheus", "metrics_prometheus", &["GET"], "Engine counters in Prometheus text format"))
        .child(ApiNode::operation("/version", "version", &["GET"], "Build information"));

    let sql = &cfg.directsql;
    if sql.enabled {
        let mut group = ApiNode::group(&sql.route_prefix, "DirectSQL").child(
            ApiNode::operation(
                "/*path",
                "directsql",
                &["GET", "POST"],
                "Runs a statement from a model file\nThe path is <model id>/<sql id>. GET binds query parameters, POST binds the JSON body.",
            )
            .param(ApiParam::new("body", "body", "Parameters of the statement", false, Some(json!({ "id": 1 }))))
            .param(ApiParam::new("query", "callback", "JSONP callback for query statements", false, Some(json!(""))))
            .http200(200, json!({ "lastinsertid": 1, "rowsaffected": 1, "info": EXEC_OK }))
            .http200(201, json!({ "code": 200, "info": BATCH_OK }))
            .http200(202, json!({ "code": 200, "info": BATCH_COMPLEX_OK })),
        );
        if cfg.middleware.basic_auth.enabled {
            group = group.middleware("BasicAuth", "Requests need Basic credentials.");
        }
        root = root.child(group).child(
            ApiNode::group(&sql.admin_prefix, "DirectSQL administration")
                .child(
                    ApiNode::operation("/reload", "reload_all", &["GET"], "Reloads every model file")
                        .http200(200, json!({ "code": 200, "info": directsql::RELOAD_ALL_OK })),
                )
                .child(
                    ApiNode::operation("/reload/*model", "reload_model", &["GET"], "Reloads one model file")
                        .http200(200, json!({ "code": 200, "info": directsql::RELOAD_MODEL_OK })),
                )
                .child(ApiNode::operation("/dbs", "list_dbs", &["GET"], "Configured databases")),
        );
    }
    if cfg.middleware.allow_ip.enabled {
        root = root.middleware("AllowIPPrefixes", "Only configured client address prefixes are served.");
    }
    root
}
