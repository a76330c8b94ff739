//! DirectSQL: named SQL statements loaded from XML model files and executed with
//! JSON parameters.
//!
//! Statements are addressed by model id (path of the model file relative to a
//! configured root, see [`ModelSqls::model_id`]) and sql id. [`DirectSql`] is the
//! programmatic entry point; `routes::directsql` exposes the same over HTTP.

pub mod engine;
pub mod model;
pub mod params;
pub mod registry;
pub mod rows;
pub mod watcher;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::info;

use crate::config::DirectSqlConfig;
use crate::dbservice::{transact, DbService};
use crate::metrics::Metrics;

pub use engine::{ExecResult, PagingResult};
pub use model::{ModelSql, SqlCmd, SqlEntity, SqlType};
pub use params::{NamedSql, Params};
pub use registry::ModelSqls;

#[derive(Debug, Error)]
pub enum DirectSqlError {
    #[error("undefined sql model: {0}")]
    ModelNotFound(String),
    #[error("undefined sql: {model}/{sql}")]
    SqlNotFound { model: String, sql: String },
    #[error("sql {model}/{sql} is a {actual} statement, expected {expected}")]
    TypeMismatch { model: String, sql: String, actual: SqlType, expected: &'static str },
    #[error("missing sql parameter: {0}")]
    MissingParameter(String),
    #[error("no parameter set named '{0}' in request")]
    ParameterSetMissing(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("invalid sql definition {model}/{sql}: {reason}")]
    InvalidDefinition { model: String, sql: String, reason: String },
    #[error("cannot parse model {model}: {message}")]
    Xml { model: String, message: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Watch(#[from] notify::Error),
}

/// Engine handle: model registry plus the pools statements run on. Cheap to clone.
#[derive(Clone)]
pub struct DirectSql {
    registry: Arc<ModelSqls>,
    dbs: DbService,
    metrics: Metrics,
}

impl DirectSql {
    pub fn new(registry: Arc<ModelSqls>, dbs: DbService, metrics: Metrics) -> Self {
        Self { registry, dbs, metrics }
    }

    /// Builds the registry from config, loads every model and starts the watcher
    /// when `watch` is set.
    pub fn from_config(cfg: &DirectSqlConfig, dbs: DbService, metrics: Metrics) -> Result<Self, DirectSqlError> {
        let registry = Arc::new(ModelSqls::new(&cfg.roots, &cfg.ext, metrics.clone()));
        registry.load_all();
        if cfg.watch {
            registry.start_watcher()?;
        }
        info!("DirectSQL ready with {} model(s), watch={}", registry.len(), cfg.watch);
        Ok(Self::new(registry, dbs, metrics))
    }

    pub fn registry(&self) -> &Arc<ModelSqls> {
        &self.registry
    }

    fn resolve(&self, model_id: &str, sql_id: &str) -> Result<(SqlitePool, Arc<SqlEntity>), DirectSqlError> {
        let (model, entity) = self.registry.find_entity(model_id, sql_id)?;
        Ok((self.dbs.resolve(&model.database), entity))
    }

    fn resolve_as(
        &self,
        model_id: &str,
        sql_id: &str,
        accepts: impl Fn(SqlType) -> bool,
        expected: &'static str,
    ) -> Result<(SqlitePool, Arc<SqlEntity>), DirectSqlError> {
        let (pool, entity) = self.resolve(model_id, sql_id)?;
        if !accepts(entity.sql_type) {
            return Err(DirectSqlError::TypeMismatch {
                model: model_id.to_string(),
                sql: sql_id.to_string(),
                actual: entity.sql_type,
                expected,
            });
        }
        Ok((pool, entity))
    }

    async fn run<T, F>(&self, pool: &SqlitePool, f: F) -> Result<T, DirectSqlError>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, DirectSqlError>>,
    {
        let mut conn = pool.acquire().await?;
        let result = f(&mut conn).await;
        self.record(&result);
        result
    }

    async fn run_tx<T, F>(&self, pool: &SqlitePool, f: F) -> Result<T, DirectSqlError>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, DirectSqlError>>,
    {
        let result = transact(pool, f).await;
        match &result {
            Ok(_) => self.metrics.inc_committed(),
            Err(_) => self.metrics.inc_rolled_back(),
        }
        self.record(&result);
        result
    }

    fn record<T>(&self, result: &Result<T, DirectSqlError>) {
        match result {
            Ok(_) => self.metrics.inc_statements_executed(),
            Err(e) => {
                self.metrics.inc_statements_failed();
                tracing::warn!("DirectSQL statement failed: {}", e);
            }
        }
    }

    async fn do_select(&self, pool: &SqlitePool, entity: Arc<SqlEntity>, params: Params) -> Result<Vec<Value>, DirectSqlError> {
        self.run(pool, move |conn| Box::pin(async move { engine::select(conn, &entity, &params).await })).await
    }

    async fn do_paging(&self, pool: &SqlitePool, entity: Arc<SqlEntity>, params: Params) -> Result<PagingResult, DirectSqlError> {
        self.run(pool, move |conn| Box::pin(async move { engine::paging_select(conn, &entity, &params).await }))
            .await
    }

    async fn do_nested(&self, pool: &SqlitePool, entity: Arc<SqlEntity>, params: Params) -> Result<Vec<Value>, DirectSqlError> {
        self.run(pool, move |conn| Box::pin(async move { engine::nested_select(conn, &entity, &params).await }))
            .await
    }

    async fn do_multi(
        &self,
        pool: &SqlitePool,
        entity: Arc<SqlEntity>,
        params: Params,
    ) -> Result<Map<String, Value>, DirectSqlError> {
        self.run(pool, move |conn| Box::pin(async move { engine::multi_select(conn, &entity, &params).await }))
            .await
    }

    async fn do_exec(&self, pool: &SqlitePool, entity: Arc<SqlEntity>, params: Params) -> Result<ExecResult, DirectSqlError> {
        if entity.transaction {
            self.run_tx(pool, move |conn| Box::pin(async move { engine::exec_entity(conn, &entity, &params).await }))
                .await
        } else {
            self.run(pool, move |conn| Box::pin(async move { engine::exec_entity(conn, &entity, &params).await }))
                .await
        }
    }

    async fn do_batch(&self, pool: &SqlitePool, entity: Arc<SqlEntity>, batch: Vec<Params>) -> Result<u64, DirectSqlError> {
        self.run_tx(pool, move |conn| Box::pin(async move { engine::batch_exec(conn, &entity, &batch).await }))
            .await
    }

    async fn do_batch_complex(
        &self,
        pool: &SqlitePool,
        entity: Arc<SqlEntity>,
        sets: HashMap<String, Vec<Params>>,
    ) -> Result<u64, DirectSqlError> {
        self.run_tx(pool, move |conn| Box::pin(async move { engine::batch_complex(conn, &entity, &sets).await }))
            .await
    }

    async fn do_insert_pro(
        &self,
        pool: &SqlitePool,
        entity: Arc<SqlEntity>,
        params: Params,
    ) -> Result<Map<String, Value>, DirectSqlError> {
        let (params, id) = engine::with_generated_id(&entity, params);
        self.run_tx(pool, move |conn| Box::pin(async move { engine::insert_pro(conn, &entity, &params, id).await }))
            .await
    }

    /// Rows of a `select` statement.
    pub async fn select_map(&self, model_id: &str, sql_id: &str, params: Params) -> Result<Vec<Value>, DirectSqlError> {
        let (pool, entity) = self.resolve_as(model_id, sql_id, |t| t == SqlType::Select, "select")?;
        self.do_select(&pool, entity, params).await
    }

    pub async fn paging_select_map(
        &self,
        model_id: &str,
        sql_id: &str,
        params: Params,
    ) -> Result<PagingResult, DirectSqlError> {
        let (pool, entity) = self.resolve_as(model_id, sql_id, |t| t == SqlType::PagingSelect, "pagingselect")?;
        self.do_paging(&pool, entity, params).await
    }

    pub async fn nested_select_map(
        &self,
        model_id: &str,
        sql_id: &str,
        params: Params,
    ) -> Result<Vec<Value>, DirectSqlError> {
        let (pool, entity) = self.resolve_as(model_id, sql_id, |t| t == SqlType::NestedSelect, "nestedselect")?;
        self.do_nested(&pool, entity, params).await
    }

    pub async fn multi_select_map(
        &self,
        model_id: &str,
        sql_id: &str,
        params: Params,
    ) -> Result<Map<String, Value>, DirectSqlError> {
        let (pool, entity) = self.resolve_as(model_id, sql_id, |t| t == SqlType::MultiSelect, "multiselect")?;
        self.do_multi(&pool, entity, params).await
    }

    /// insert, update or delete.
    pub async fn exec_map(&self, model_id: &str, sql_id: &str, params: Params) -> Result<ExecResult, DirectSqlError> {
        let (pool, entity) = self.resolve_as(model_id, sql_id, |t| t.is_exec(), "insert|update|delete")?;
        self.do_exec(&pool, entity, params).await
    }

    /// batchinsert or batchupdate; all maps in one transaction. Returns rows affected.
    pub async fn batch_exec_map(
        &self,
        model_id: &str,
        sql_id: &str,
        batch: Vec<Params>,
    ) -> Result<u64, DirectSqlError> {
        let (pool, entity) = self.resolve_as(model_id, sql_id, |t| t.is_batch(), "batchinsert|batchupdate")?;
        self.do_batch(&pool, entity, batch).await
    }

    pub async fn batch_exec_complex_map(
        &self,
        model_id: &str,
        sql_id: &str,
        sets: HashMap<String, Vec<Params>>,
    ) -> Result<u64, DirectSqlError> {
        let (pool, entity) = self.resolve_as(model_id, sql_id, |t| t == SqlType::BatchComplex, "batchcomplex")?;
        self.do_batch_complex(&pool, entity, sets).await
    }

    pub async fn insert_pro_map(
        &self,
        model_id: &str,
        sql_id: &str,
        params: Params,
    ) -> Result<Map<String, Value>, DirectSqlError> {
        let (pool, entity) = self.resolve_as(model_id, sql_id, |t| t == SqlType::InsertPro, "insertpro")?;
        self.do_insert_pro(&pool, entity, params).await
    }

    /// Type of a statement, if it exists.
    pub fn sql_type(&self, model_id: &str, sql_id: &str) -> Result<SqlType, DirectSqlError> {
        Ok(self.registry.find_entity(model_id, sql_id)?.1.sql_type)
    }

    /// Runs any statement with a JSON payload shaped for its type: an object for
    /// single statements, an array of objects for batches, an object of arrays for
    /// `batchcomplex`. `null` counts as an empty payload.
    pub async fn execute(&self, model_id: &str, sql_id: &str, payload: Value) -> Result<Value, DirectSqlError> {
        let (pool, entity) = self.resolve(model_id, sql_id)?;
        match entity.sql_type {
            SqlType::Select => Ok(Value::Array(self.do_select(&pool, entity, into_params(payload)?).await?)),
            SqlType::PagingSelect => {
                let page = self.do_paging(&pool, entity, into_params(payload)?).await?;
                Ok(json!({ "total": page.total, "data": page.data }))
            }
            SqlType::NestedSelect => Ok(Value::Array(self.do_nested(&pool, entity, into_params(payload)?).await?)),
            SqlType::MultiSelect => Ok(Value::Object(self.do_multi(&pool, entity, into_params(payload)?).await?)),
            SqlType::Insert | SqlType::Update | SqlType::Delete => {
                let done = self.do_exec(&pool, entity, into_params(payload)?).await?;
                Ok(json!({ "lastinsertid": done.lastinsertid, "rowsaffected": done.rowsaffected, "info": done.info }))
            }
            SqlType::BatchInsert | SqlType::BatchUpdate => {
                self.do_batch(&pool, entity, into_batch(payload)?).await?;
                Ok(json!({ "code": 200, "info": engine::BATCH_OK }))
            }
            SqlType::BatchComplex => {
                self.do_batch_complex(&pool, entity, into_sets(payload)?).await?;
                Ok(json!({ "code": 200, "info": engine::BATCH_COMPLEX_OK }))
            }
            SqlType::InsertPro => Ok(Value::Object(self.do_insert_pro(&pool, entity, into_params(payload)?).await?)),
        }
    }
}

fn into_params(payload: Value) -> Result<Params, DirectSqlError> {
    match payload {
        Value::Null => Ok(Params::new()),
        Value::Object(map) => Ok(map),
        other => Err(DirectSqlError::InvalidParameters(format!("expected a JSON object, got {}", kind(&other)))),
    }
}

fn into_batch(payload: Value) -> Result<Vec<Params>, DirectSqlError> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.into_iter().map(into_params).collect(),
        other => Err(DirectSqlError::InvalidParameters(format!("expected a JSON array, got {}", kind(&other)))),
    }
}

fn into_sets(payload: Value) -> Result<HashMap<String, Vec<Params>>, DirectSqlError> {
    into_params(payload)?.into_iter().map(|(name, batch)| Ok((name, into_batch(batch)?))).collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
