#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use sqlx::SqlitePool;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::dbservice::DbService;
    use crate::directsql::DirectSql;
    use crate::metrics::Metrics;
    use crate::routes::api_router;
    use crate::routes::health::readyz;
    use crate::state::AppState;
    use crate::tests::support::{body_bytes, body_json, fixture};

    async fn setup_test_app() -> Router {
        api_router(fixture().await.state())
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let app = setup_test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"ok");
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let app = setup_test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let v = body_json(response).await;
        assert_eq!(v["name"], "lessgoext");
        assert!(!v["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_readyz_endpoint_ok() {
        let app = setup_test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"ready");
    }

    #[tokio::test]
    async fn test_readyz_endpoint_db_error() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        pool.close().await;
        let dbs = DbService::from_pools("main", vec![("main".to_string(), "sqlite::memory:".to_string(), pool)]).unwrap();
        let config = AppConfig::default();
        let metrics = Metrics::new();
        let directsql = DirectSql::from_config(&config.directsql, dbs.clone(), metrics.clone()).unwrap();
        let state = AppState::new(config, dbs, directsql, metrics);

        let app = Router::new().route("/readyz", get(readyz)).with_state(state);

        let response = app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(String::from_utf8_lossy(&body_bytes(response).await).contains("not ready"));
    }

    #[tokio::test]
    async fn test_metrics_count_statements() {
        let fx = fixture().await;
        let app = api_router(fx.state());
        app.clone()
            .oneshot(Request::builder().uri("/bos/biz/demo/users?minage=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        app.clone()
            .oneshot(Request::builder().uri("/bos/biz/demo/users").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let v = body_json(response).await;
        assert_eq!(v["statements_executed"], 1);
        assert_eq!(v["statements_failed"], 1);
        assert_eq!(v["models_loaded"], 1);
    }

    #[tokio::test]
    async fn test_metrics_prometheus_endpoint() {
        let app = setup_test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/metrics/prometheus").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body_str = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body_str.contains("lessgoext_statements_executed 0"));
        assert!(body_str.contains("lessgoext_models_loaded 1"));
        assert!(body_str.contains("# TYPE lessgoext_uptime_seconds gauge"));
    }
}
