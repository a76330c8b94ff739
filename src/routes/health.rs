use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: default pool answers SELECT 1 within 5 seconds
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.dbs.default_db();
    let query = sqlx::query("SELECT 1").fetch_one(&pool);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot();
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let body = format!(
        "# HELP lessgoext_statements_executed SQL statements executed\n# TYPE lessgoext_statements_executed counter\nlessgoext_statements_executed {}\n\
# HELP lessgoext_statements_failed SQL statements failed\n# TYPE lessgoext_statements_failed counter\nlessgoext_statements_failed {}\n\
# HELP lessgoext_transactions_committed Transactions committed\n# TYPE lessgoext_transactions_committed counter\nlessgoext_transactions_committed {}\n\
# HELP lessgoext_transactions_rolled_back Transactions rolled back\n# TYPE lessgoext_transactions_rolled_back counter\nlessgoext_transactions_rolled_back {}\n\
# HELP lessgoext_models_loaded Model files loaded\n# TYPE lessgoext_models_loaded counter\nlessgoext_models_loaded {}\n\
# HELP lessgoext_models_failed Model files rejected\n# TYPE lessgoext_models_failed counter\nlessgoext_models_failed {}\n\
# HELP lessgoext_reloads Reload requests\n# TYPE lessgoext_reloads counter\nlessgoext_reloads {}\n\
# HELP lessgoext_uptime_seconds Uptime seconds\n# TYPE lessgoext_uptime_seconds gauge\nlessgoext_uptime_seconds {}\n",
        m.statements_executed,
        m.statements_failed,
        m.transactions_committed,
        m.transactions_rolled_back,
        m.models_loaded,
        m.models_failed,
        m.reloads,
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
