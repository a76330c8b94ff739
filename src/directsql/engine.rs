//! Statement execution per [`SqlType`](super::model::SqlType).
//!
//! Every function runs on a single connection; whether that connection is inside a
//! transaction is decided by the caller.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use super::model::{SqlCmd, SqlEntity};
use super::params::Params;
use super::rows::{build_forest, row_to_json};
use super::DirectSqlError;

pub const EXEC_OK: &str = "Exec sql ok!";
pub const BATCH_OK: &str = "Exec batch sql ok!";
pub const BATCH_COMPLEX_OK: &str = "Exec batch complex sql ok!";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecResult {
    pub lastinsertid: i64,
    pub rowsaffected: u64,
    pub info: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagingResult {
    pub total: i64,
    pub data: Vec<Value>,
}

async fn fetch(
    conn: &mut SqliteConnection,
    cmd: &SqlCmd,
    params: &Params,
) -> Result<Vec<Map<String, Value>>, DirectSqlError> {
    debug!("query: {}", cmd.sql.sql());
    let rows = cmd.sql.bind(params)?.fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

async fn exec(conn: &mut SqliteConnection, cmd: &SqlCmd, params: &Params) -> Result<SqliteQueryResult, DirectSqlError> {
    debug!("exec: {}", cmd.sql.sql());
    Ok(cmd.sql.bind(params)?.execute(&mut *conn).await?)
}

fn first_cmd(entity: &SqlEntity) -> &SqlCmd {
    // Loading rejects entities without commands.
    &entity.cmds[0]
}

pub async fn select(conn: &mut SqliteConnection, entity: &SqlEntity, params: &Params) -> Result<Vec<Value>, DirectSqlError> {
    let rows = fetch(conn, first_cmd(entity), params).await?;
    Ok(rows.into_iter().map(Value::Object).collect())
}

/// cmd[0] counts, cmd[1] fetches the page.
pub async fn paging_select(
    conn: &mut SqliteConnection,
    entity: &SqlEntity,
    params: &Params,
) -> Result<PagingResult, DirectSqlError> {
    let count = &entity.cmds[0];
    let row = count.sql.bind(params)?.fetch_one(&mut *conn).await?;
    let total: i64 = row.try_get(0)?;
    let data = fetch(conn, &entity.cmds[1], params).await?;
    Ok(PagingResult { total, data: data.into_iter().map(Value::Object).collect() })
}

pub async fn nested_select(
    conn: &mut SqliteConnection,
    entity: &SqlEntity,
    params: &Params,
) -> Result<Vec<Value>, DirectSqlError> {
    let rows = fetch(conn, first_cmd(entity), params).await?;
    Ok(build_forest(rows, &entity.idfield, &entity.pidfield))
}

/// Each cmd's rows under its `out` name, or `data{index}` when unnamed.
pub async fn multi_select(
    conn: &mut SqliteConnection,
    entity: &SqlEntity,
    params: &Params,
) -> Result<Map<String, Value>, DirectSqlError> {
    let mut result = Map::new();
    for (i, cmd) in entity.cmds.iter().enumerate() {
        let rows = fetch(conn, cmd, params).await?;
        let key = if cmd.output.is_empty() { format!("data{}", i) } else { cmd.output.clone() };
        result.insert(key, Value::Array(rows.into_iter().map(Value::Object).collect()));
    }
    Ok(result)
}

/// insert/update/delete: the first cmd, or every cmd when the entity is transactional.
pub async fn exec_entity(
    conn: &mut SqliteConnection,
    entity: &SqlEntity,
    params: &Params,
) -> Result<ExecResult, DirectSqlError> {
    let cmds = if entity.transaction { &entity.cmds[..] } else { &entity.cmds[..1] };
    let mut result = ExecResult { lastinsertid: 0, rowsaffected: 0, info: EXEC_OK };
    for cmd in cmds {
        let done = exec(conn, cmd, params).await?;
        result.lastinsertid = done.last_insert_rowid();
        result.rowsaffected += done.rows_affected();
    }
    Ok(result)
}

/// The first cmd once per parameter map.
pub async fn batch_exec(
    conn: &mut SqliteConnection,
    entity: &SqlEntity,
    batch: &[Params],
) -> Result<u64, DirectSqlError> {
    let cmd = first_cmd(entity);
    let mut affected = 0;
    for params in batch {
        affected += exec(conn, cmd, params).await?.rows_affected();
    }
    Ok(affected)
}

/// Every cmd once per parameter map of its `in` set, in cmd order.
pub async fn batch_complex(
    conn: &mut SqliteConnection,
    entity: &SqlEntity,
    sets: &HashMap<String, Vec<Params>>,
) -> Result<u64, DirectSqlError> {
    let mut affected = 0;
    for cmd in &entity.cmds {
        let batch = sets.get(&cmd.input).ok_or_else(|| DirectSqlError::ParameterSetMissing(cmd.input.clone()))?;
        for params in batch {
            affected += exec(conn, cmd, params).await?.rows_affected();
        }
    }
    Ok(affected)
}

/// Fills a missing `idfield` with a fresh UUID, then runs every cmd.
pub fn with_generated_id(entity: &SqlEntity, mut params: Params) -> (Params, Option<Value>) {
    if entity.idfield.is_empty() {
        return (params, None);
    }
    let id = match params.get(&entity.idfield) {
        Some(v) if !v.is_null() => v.clone(),
        _ => {
            let id = Value::String(uuid::Uuid::new_v4().to_string());
            params.insert(entity.idfield.clone(), id.clone());
            id
        }
    };
    (params, Some(id))
}

pub async fn insert_pro(
    conn: &mut SqliteConnection,
    entity: &SqlEntity,
    params: &Params,
    id: Option<Value>,
) -> Result<Map<String, Value>, DirectSqlError> {
    let mut rowsaffected = 0;
    let mut lastinsertid = 0;
    for cmd in &entity.cmds {
        let done = exec(conn, cmd, params).await?;
        rowsaffected += done.rows_affected();
        lastinsertid = done.last_insert_rowid();
    }
    let mut result = Map::new();
    match id {
        Some(id) => result.insert(entity.idfield.clone(), id),
        None => result.insert("lastinsertid".to_string(), Value::from(lastinsertid)),
    };
    result.insert("rowsaffected".to_string(), Value::from(rowsaffected));
    result.insert("info".to_string(), Value::from(EXEC_OK));
    Ok(result)
}
