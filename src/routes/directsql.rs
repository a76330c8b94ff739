//! HTTP front of the dynamic SQL engine.
//!
//! `{route_prefix}/<model id>/<sql id>` runs a statement: GET takes the query string,
//! POST a JSON body. `{admin_prefix}/reload[/<model id>]` reloads model files.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use anyhow::anyhow;
use serde_json::Value;
use tokio::task::spawn_blocking;
use tracing::{debug, info};

use crate::directsql::params::from_query_pairs;
use crate::directsql::{DirectSqlError, Params};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::types::{CodeInfo, DbInfo};

const CALLBACK: &str = "callback";
pub const RELOAD_ALL_OK: &str = "Reload all modelsqls file ok!";
pub const RELOAD_MODEL_OK: &str = "Reload the modelsql file ok!";

/// `biz/demo/getUser` → (`biz/demo`, `getUser`).
pub fn split_path(path: &str) -> Result<(&str, &str), DirectSqlError> {
    let path = path.trim_matches('/');
    match path.rsplit_once('/') {
        Some((model, sql)) if !model.is_empty() && !sql.is_empty() => Ok((model, sql)),
        _ => Err(DirectSqlError::ModelNotFound(path.to_string())),
    }
}

fn parse_query(query: Option<&str>) -> AppResult<Params> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query.unwrap_or_default())
        .map_err(|e| AppError::BadRequest(format!("invalid query string: {}", e)))?;
    Ok(from_query_pairs(pairs))
}

fn is_callback_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}

/// Removes a string `callback` parameter.
fn take_callback(params: &mut Params) -> AppResult<Option<String>> {
    match params.remove(CALLBACK) {
        Some(Value::String(name)) if is_callback_name(&name) => Ok(Some(name)),
        Some(Value::String(name)) => Err(AppError::BadRequest(format!("invalid JSONP callback: {}", name))),
        Some(other) => {
            params.insert(CALLBACK.to_string(), other);
            Ok(None)
        }
        None => Ok(None),
    }
}

fn respond(result: Value, callback: Option<String>) -> Response {
    match callback {
        Some(name) => {
            let mut res = format!("{}({})", name, result).into_response();
            res.headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/javascript; charset=utf-8"));
            res
        }
        None => Json(result).into_response(),
    }
}

async fn run(state: &AppState, path: &str, mut payload: Value, query: &mut Params) -> AppResult<Response> {
    let (model, sql) = split_path(path)?;
    let sql_type = state.directsql.sql_type(model, sql)?;
    let callback = if sql_type.is_query() {
        match take_callback(query)? {
            Some(name) => Some(name),
            None => match payload.as_object_mut() {
                Some(body) => take_callback(body)?,
                None => None,
            },
        }
    } else {
        None
    };
    debug!("DirectSQL {}/{} ({})", model, sql, sql_type);
    let result = state.directsql.execute(model, sql, payload).await?;
    Ok(respond(result, callback))
}

/// `GET {route_prefix}/{*path}`; query values arrive as strings.
pub async fn directsql_get(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> AppResult<Response> {
    let mut params = parse_query(query.as_deref())?;
    let callback = params.remove(CALLBACK);
    let mut query = Params::new();
    if let Some(cb) = callback {
        query.insert(CALLBACK.to_string(), cb);
    }
    run(&state, &path, Value::Object(params), &mut query).await
}

/// `POST {route_prefix}/{*path}`; an empty body counts as `{}`.
pub async fn directsql_post(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> AppResult<Response> {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?
    };
    let mut query = parse_query(query.as_deref())?;
    run(&state, &path, payload, &mut query).await
}

/// `GET {admin_prefix}/reload`
pub async fn reload_all(State(state): State<AppState>) -> AppResult<Json<CodeInfo>> {
    let registry = state.directsql.registry().clone();
    let count = spawn_blocking(move || registry.reload_all())
        .await
        .map_err(|e| AppError::Internal(anyhow!("reload task join error: {}", e)))?;
    info!("Reloaded {} model file(s)", count);
    Ok(Json(CodeInfo::ok(RELOAD_ALL_OK)))
}

/// `GET {admin_prefix}/reload/{*model}`
pub async fn reload_model(State(state): State<AppState>, Path(model): Path<String>) -> AppResult<Json<CodeInfo>> {
    let registry = state.directsql.registry().clone();
    let model = model.trim_matches('/').to_string();
    spawn_blocking(move || registry.reload_model(&model))
        .await
        .map_err(|e| AppError::Internal(anyhow!("reload task join error: {}", e)))??;
    Ok(Json(CodeInfo::ok(RELOAD_MODEL_OK)))
}

/// `GET {admin_prefix}/dbs`
pub async fn list_dbs(State(state): State<AppState>) -> Json<Vec<DbInfo>> {
    let default = state.dbs.default_name();
    let dbs = state
        .dbs
        .db_list()
        .into_iter()
        .map(|(name, _)| DbInfo { default: name == default, name })
        .collect();
    Json(dbs)
}
