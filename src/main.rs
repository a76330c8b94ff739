use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lessgoext::{
    app, config, dbservice::DbService, directsql::DirectSql, metrics::Metrics, routes, state::AppState,
    swagger::{self, ApiDoc},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging (stdout + daily rotated file under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "lessgoext.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard);

    // Load configuration (embedded defaults -> lessgoext.toml -> env/.env)
    let app_cfg = config::load()?;

    let metrics = Metrics::new();
    let dbs = DbService::init(&app_cfg.dbservice).await?;
    let directsql = DirectSql::from_config(&app_cfg.directsql, dbs.clone(), metrics.clone())?;

    let apidoc = if app_cfg.apidoc.enabled {
        let ui_source = Path::new(&app_cfg.apidoc.ui_source_dir);
        let ui_dir = Path::new(&app_cfg.apidoc.ui_dir);
        match swagger::install_ui(ui_source, ui_dir) {
            Ok(0) => {}
            Ok(n) => info!("Installed swagger-ui ({} files) into {}", n, ui_dir.display()),
            Err(e) => warn!("swagger-ui not installed from {}: {}", ui_source.display(), e),
        }
        let tree = routes::api_tree(&app_cfg);
        Some(Arc::new(ApiDoc::new(tree, app_cfg.app.clone(), app_cfg.server.tls, ui_dir)))
    } else {
        None
    };

    let state = AppState::new(app_cfg.clone(), dbs.clone(), directsql.clone(), metrics);
    let app = app::build_app(state, apidoc)?;

    // Server listen addr (from config)
    let port: u16 = app_cfg.server.port;
    let host: String = app_cfg.server.host.clone();
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("lessgoext listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    directsql.registry().stop_watcher();
    for (name, pool) in dbs.db_list() {
        info!("Closing database '{}'", name);
        pool.close().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
