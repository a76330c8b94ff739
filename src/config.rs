use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::middleware::{
    basic_auth::BasicAuthConfig, body_limit::BodyLimitConfig, compress::GzipConfig, cors::CorsConfig,
    ip::AllowIpConfig, method_override::MethodOverrideConfig, secure::SecureConfig,
    slash::TrailingSlashConfig, static_files::StaticConfig,
};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
}

/// Descriptive application info, published in the swagger `info` block.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppInfoConfig {
    pub name: String,
    pub description: String,
    pub version: String,
    pub email: String,
    pub terms_of_service_url: String,
    pub license: String,
    pub license_url: String,
}

/// One named connection pool.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub max_open_conns: u32,
    #[serde(default = "default_pool_size")]
    pub max_idle_conns: u32,
}

fn default_pool_size() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbServiceConfig {
    pub default: String,
    pub databases: Vec<DbConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectSqlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Short name -> directory holding model files.
    #[serde(default)]
    pub roots: HashMap<String, String>,
    #[serde(default = "default_ext")]
    pub ext: String,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
    #[serde(default = "default_admin_prefix")]
    pub admin_prefix: String,
}

impl Default for DirectSqlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            roots: HashMap::new(),
            ext: default_ext(),
            watch: false,
            route_prefix: default_route_prefix(),
            admin_prefix: default_admin_prefix(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ext() -> String {
    ".msql".to_string()
}

fn default_route_prefix() -> String {
    "/bos".to_string()
}

fn default_admin_prefix() -> String {
    "/bom".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub cors: CorsConfig,
    pub gzip: GzipConfig,
    pub body_limit: BodyLimitConfig,
    pub secure: SecureConfig,
    pub static_files: StaticConfig,
    pub trailing_slash: TrailingSlashConfig,
    pub method_override: MethodOverrideConfig,
    pub basic_auth: BasicAuthConfig,
    pub allow_ip: AllowIpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDocConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub allow_wan: bool,
    /// Pristine swagger-ui assets; copied into `ui_dir` on first registration.
    pub ui_source_dir: String,
    pub ui_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub app: AppInfoConfig,
    pub dbservice: DbServiceConfig,
    #[serde(default)]
    pub directsql: DirectSqlConfig,
    #[serde(default)]
    pub middleware: MiddlewareConfig,
    pub apidoc: ApiDocConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => panic!("Failed to deserialize default config: {}", e),
            },
            Err(e) => panic!("Failed to parse default config: {}", e),
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: lessgoext.toml (in CWD)
        .add_source(::config::File::with_name("lessgoext").required(false));

    if let Ok(custom_path) = std::env::var("LESSGOEXT_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("LESSGOEXT")
            .prefix_separator("__")
            .separator("__"),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Database service
    if cfg.dbservice.databases.is_empty() {
        return Err(anyhow::anyhow!("dbservice.databases must not be empty"));
    }
    if !cfg.dbservice.databases.iter().any(|db| db.name == cfg.dbservice.default) {
        return Err(anyhow::anyhow!(
            "dbservice.default '{}' is not a configured database",
            cfg.dbservice.default
        ));
    }
    for db in &cfg.dbservice.databases {
        if db.name.trim().is_empty() {
            return Err(anyhow::anyhow!("dbservice.databases: name must not be empty"));
        }
        if db.max_open_conns == 0 {
            return Err(anyhow::anyhow!("dbservice.databases.{}: max_open_conns must be > 0", db.name));
        }
    }

    // Dynamic SQL
    if !cfg.directsql.ext.starts_with('.') {
        return Err(anyhow::anyhow!("directsql.ext must start with '.'"));
    }
    for prefix in [&cfg.directsql.route_prefix, &cfg.directsql.admin_prefix] {
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(anyhow::anyhow!("directsql prefixes must start and not end with '/': {}", prefix));
        }
    }

    // Middleware
    if cfg.middleware.body_limit.enabled {
        crate::bitconv::parse(&cfg.middleware.body_limit.limit)
            .map_err(|e| anyhow::anyhow!("invalid middleware.body_limit.limit: {}", e))?;
    }
    if let Some(level) = cfg.middleware.gzip.level_if_invalid() {
        return Err(anyhow::anyhow!("middleware.gzip.level must be -1 or in 1..=9, got {}", level));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        // On Windows, handle URLs like sqlite:///C:/... by stripping the leading '/'
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        let path = path.split('?').next().unwrap_or(path);
        if path == ":memory:" {
            return Ok(());
        }
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
