#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use tower::ServiceExt;

    use crate::app::build_app;
    use crate::config::AppConfig;
    use crate::middleware::slash::SlashMode;
    use crate::tests::support::{body_bytes, fixture, Fixture};

    fn app_with(fx: &Fixture, configure: impl FnOnce(&mut AppConfig)) -> Router {
        let mut config = fx.config.clone();
        configure(&mut config);
        build_app(fx.state_with(config), None).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn text(response: axum::response::Response) -> String {
        String::from_utf8(body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| {
            c.middleware.basic_auth.enabled = true;
            c.middleware.basic_auth.users = HashMap::from([("joe".to_string(), "secret".to_string())]);
        });

        let res = app.clone().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Basic realm=Restricted");

        let req = Request::builder()
            .uri("/healthz")
            .header(header::AUTHORIZATION, "Basic !!!not-base64")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::BAD_REQUEST);

        let wrong = format!("Basic {}", STANDARD.encode("joe:guess"));
        let req = Request::builder().uri("/healthz").header(header::AUTHORIZATION, wrong).body(Body::empty()).unwrap();
        assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::UNAUTHORIZED);

        let right = format!("Basic {}", STANDARD.encode("joe:secret"));
        let req = Request::builder().uri("/healthz").header(header::AUTHORIZATION, right).body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text(res).await, "ok");
    }

    #[tokio::test]
    async fn test_allow_ip_rejects_wan_clients() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| c.middleware.allow_ip.enabled = true);

        assert_eq!(app.clone().oneshot(get("/healthz")).await.unwrap().status(), StatusCode::OK);

        let req = Request::builder().uri("/healthz").header("x-forwarded-for", "8.8.8.8").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(text(res).await.contains("Only allow LAN access, your ip is 8.8.8.8."));
    }

    #[tokio::test]
    async fn test_secure_headers() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| {
            c.middleware.secure.hsts_max_age = 31536000;
            c.middleware.secure.content_security_policy = "default-src 'self'".to_string();
        });

        let res = app.clone().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(res.headers()["x-xss-protection"], "1; mode=block");
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        assert_eq!(res.headers()["x-frame-options"], "SAMEORIGIN");
        assert_eq!(res.headers()["content-security-policy"], "default-src 'self'");
        assert!(res.headers().get("strict-transport-security").is_none());

        let req = Request::builder().uri("/healthz").header("x-forwarded-proto", "https").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.headers()["strict-transport-security"], "max-age=31536000; includeSubdomains");
    }

    #[tokio::test]
    async fn test_trailing_slash_rewrite_and_redirect() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| c.middleware.trailing_slash.mode = SlashMode::Remove);
        let res = app.oneshot(get("/healthz/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text(res).await, "ok");

        let app = app_with(&fx, |c| {
            c.middleware.trailing_slash.mode = SlashMode::Add;
            c.middleware.trailing_slash.redirect_code = Some(301);
        });
        let res = app.oneshot(get("/healthz?x=1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.headers()[header::LOCATION], "/healthz/?x=1");
    }

    #[tokio::test]
    async fn test_method_override_header() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| c.middleware.method_override.enabled = true);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/healthz")
            .header("X-HTTP-Method-Override", "get")
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let req = Request::builder().method(Method::POST).uri("/healthz").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_method_override_form_field() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| {
            c.middleware.method_override.enabled = true;
            c.middleware.method_override.getter = crate::middleware::method_override::OverrideGetter::Form;
            c.middleware.method_override.name = "_method".to_string();
        });

        let req = Request::builder()
            .method(Method::POST)
            .uri("/healthz")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("_method=GET"))
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_static_files() {
        let fx = fixture().await;
        let root = fx.dir.path().join("static");
        std::fs::create_dir_all(root.join("docs/img")).unwrap();
        std::fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(root.join("docs/a.txt"), "alpha").unwrap();
        let app = app_with(&fx, |c| {
            c.middleware.static_files.enabled = true;
            c.middleware.static_files.root = root.display().to_string();
        });

        let res = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text(res).await, "<h1>home</h1>");

        let res = app.clone().oneshot(get("/docs/a.txt")).await.unwrap();
        assert_eq!(text(res).await, "alpha");

        let res = app.clone().oneshot(get("/docs")).await.unwrap();
        assert!(res.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        let listing = text(res).await;
        assert!(listing.contains(r#"<a href="/docs/a.txt" style="color: #212121;">a.txt</a>"#));
        assert!(listing.contains(r#"<a href="/docs/img/" style="color: #e91e63;">img/</a>"#));

        let res = app.clone().oneshot(get("/docs/../../secret")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        // Not a file: falls through to the routes.
        let res = app.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(text(res).await, "ok");
    }

    #[tokio::test]
    async fn test_static_files_without_browse() {
        let fx = fixture().await;
        let root = fx.dir.path().join("assets");
        std::fs::create_dir_all(root.join("empty")).unwrap();
        let app = app_with(&fx, |c| {
            c.middleware.static_files.enabled = true;
            c.middleware.static_files.root = root.display().to_string();
            c.middleware.static_files.prefix = "/assets".to_string();
            c.middleware.static_files.browse = false;
        });
        let res = app.oneshot(get("/assets/empty")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_prefix_ends_on_segment() {
        let fx = fixture().await;
        let root = fx.dir.path().join("public");
        std::fs::create_dir_all(root.join("x")).unwrap();
        std::fs::write(root.join("x/a.txt"), "alpha").unwrap();
        let app = app_with(&fx, |c| {
            c.middleware.static_files.enabled = true;
            c.middleware.static_files.root = root.display().to_string();
            c.middleware.static_files.prefix = "/static".to_string();
        });

        let res = app.clone().oneshot(get("/static/x/a.txt")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text(res).await, "alpha");

        let res = app.oneshot(get("/staticx/a.txt")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| c.middleware.cors.enabled = true);

        let req = Request::builder().uri("/healthz").header(header::ORIGIN, "https://a.example").body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/bos/biz/demo/add")
            .header(header::ORIGIN, "https://a.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-token")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap().contains("POST"));
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS], "x-token");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| c.middleware.body_limit.limit = "16B".to_string());

        let body = r#"{"name":"someone with a long name","age":1}"#;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/bos/biz/demo/add")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_body_limit_streamed_body() {
        let fx = fixture().await;
        let app = app_with(&fx, |c| c.middleware.body_limit.limit = "16B".to_string());

        let chunks: Vec<Result<&'static str, std::io::Error>> =
            vec![Ok(r#"{"name":"someone with","#), Ok(r#""age":1,"note":"a long name"}"#)];
        let req = Request::builder()
            .method(Method::POST)
            .uri("/bos/biz/demo/add")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap();
        assert!(req.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_gzip() {
        let fx = fixture().await;
        let app = app_with(&fx, |_| {});

        let req = Request::builder()
            .uri("/bos/biz/demo/users?minage=1")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.headers()[header::CONTENT_ENCODING], "gzip");

        let res = app.oneshot(get("/bos/biz/demo/users?minage=1")).await.unwrap();
        assert!(res.headers().get(header::CONTENT_ENCODING).is_none());
    }
}
