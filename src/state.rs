use std::sync::Arc;

use crate::config::AppConfig;
use crate::dbservice::DbService;
use crate::directsql::DirectSql;
use crate::metrics::Metrics;

/// The shared application state.
///
/// Cloned into every handler by axum; all members are cheap handles around
/// shared data.
#[derive(Clone)]
pub struct AppState {
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Named connection pools.
    pub dbs: DbService,
    /// Dynamic SQL engine; shares `dbs` and `metrics`.
    pub directsql: DirectSql,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: AppConfig, dbs: DbService, directsql: DirectSql, metrics: Metrics) -> Self {
        Self { config: Arc::new(config), dbs, directsql, metrics }
    }
}
