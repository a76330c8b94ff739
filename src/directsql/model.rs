//! Model files: one XML document per file, holding named SQL entities.
//!
//! ```xml
//! <model id="demo" database="lessgo">
//!   <sql id="list" type="pagingselect">
//!     <cmd>SELECT COUNT(*) FROM users</cmd>
//!     <cmd><![CDATA[SELECT * FROM users WHERE age > ?minage LIMIT ?limit]]></cmd>
//!   </sql>
//! </model>
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use super::params::NamedSql;
use super::DirectSqlError;

/// Execution mode of a SQL entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Select,
    PagingSelect,
    NestedSelect,
    MultiSelect,
    Delete,
    Insert,
    Update,
    BatchInsert,
    BatchUpdate,
    BatchComplex,
    InsertPro,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Select => "select",
            SqlType::PagingSelect => "pagingselect",
            SqlType::NestedSelect => "nestedselect",
            SqlType::MultiSelect => "multiselect",
            SqlType::Delete => "delete",
            SqlType::Insert => "insert",
            SqlType::Update => "update",
            SqlType::BatchInsert => "batchinsert",
            SqlType::BatchUpdate => "batchupdate",
            SqlType::BatchComplex => "batchcomplex",
            SqlType::InsertPro => "insertpro",
        }
    }

    /// Read modes return rows and may be answered as JSONP.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            SqlType::Select | SqlType::PagingSelect | SqlType::NestedSelect | SqlType::MultiSelect
        )
    }

    pub fn is_exec(&self) -> bool {
        matches!(self, SqlType::Delete | SqlType::Insert | SqlType::Update)
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, SqlType::BatchInsert | SqlType::BatchUpdate)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "select" => SqlType::Select,
            "pagingselect" => SqlType::PagingSelect,
            "nestedselect" => SqlType::NestedSelect,
            "multiselect" => SqlType::MultiSelect,
            "delete" => SqlType::Delete,
            "insert" => SqlType::Insert,
            "update" => SqlType::Update,
            "batchinsert" => SqlType::BatchInsert,
            "batchupdate" => SqlType::BatchUpdate,
            "batchcomplex" => SqlType::BatchComplex,
            "insertpro" => SqlType::InsertPro,
            other => return Err(format!("unknown sql type '{}'", other)),
        })
    }
}

/// One command of an entity. `input` names the parameter set used by
/// `batchcomplex`; `output` names the result key used by `multiselect`.
#[derive(Debug, Clone)]
pub struct SqlCmd {
    pub input: String,
    pub output: String,
    pub sql: NamedSql,
}

#[derive(Debug, Clone)]
pub struct SqlEntity {
    pub id: String,
    pub sql_type: SqlType,
    pub idfield: String,
    pub pidfield: String,
    pub transaction: bool,
    pub cmds: Vec<SqlCmd>,
}

/// Parsed content of one model file.
#[derive(Debug, Clone)]
pub struct ModelSql {
    pub id: String,
    /// Name of the DBService pool; empty or unknown means the default pool.
    pub database: String,
    pub path: PathBuf,
    pub entities: HashMap<String, Arc<SqlEntity>>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@database", default)]
    database: String,
    #[serde(rename = "sql", default)]
    sqls: Vec<RawSql>,
}

#[derive(Debug, Deserialize)]
struct RawSql {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@type", default)]
    sql_type: String,
    #[serde(rename = "@idfield", default)]
    idfield: String,
    #[serde(rename = "@pidfield", default)]
    pidfield: String,
    #[serde(rename = "@transaction", default)]
    transaction: String,
    #[serde(rename = "cmd", default)]
    cmds: Vec<RawCmd>,
}

#[derive(Debug, Deserialize)]
struct RawCmd {
    #[serde(rename = "@in", default)]
    input: String,
    #[serde(rename = "@out", default)]
    output: String,
    #[serde(rename = "$text", default)]
    text: String,
}

impl ModelSql {
    /// Reads and validates a model file, registering it under `model_id`.
    pub fn from_file(path: &Path, model_id: &str) -> Result<Self, DirectSqlError> {
        let content = std::fs::read_to_string(path)?;
        let mut model = Self::parse(&content, model_id)?;
        model.path = path.to_path_buf();
        Ok(model)
    }

    /// Parses a model document. The registry id wins over the `id` attribute,
    /// which is informational only.
    pub fn parse(xml: &str, model_id: &str) -> Result<Self, DirectSqlError> {
        let raw: RawModel = quick_xml::de::from_str(xml)
            .map_err(|e| DirectSqlError::Xml { model: model_id.to_string(), message: e.to_string() })?;
        if !raw.id.is_empty() && raw.id != model_id {
            tracing::debug!("Model attribute id '{}' differs from file id '{}'", raw.id, model_id);
        }

        let mut entities = HashMap::with_capacity(raw.sqls.len());
        for sql in raw.sqls {
            let entity = build_entity(model_id, sql)?;
            if entities.contains_key(&entity.id) {
                return Err(invalid(model_id, &entity.id, "duplicate sql id"));
            }
            entities.insert(entity.id.clone(), Arc::new(entity));
        }

        Ok(ModelSql {
            id: model_id.to_string(),
            database: raw.database,
            path: PathBuf::new(),
            entities,
        })
    }

    pub fn entity(&self, sql_id: &str) -> Option<Arc<SqlEntity>> {
        self.entities.get(sql_id).cloned()
    }
}

fn invalid(model: &str, sql: &str, reason: &str) -> DirectSqlError {
    DirectSqlError::InvalidDefinition {
        model: model.to_string(),
        sql: sql.to_string(),
        reason: reason.to_string(),
    }
}

fn build_entity(model_id: &str, raw: RawSql) -> Result<SqlEntity, DirectSqlError> {
    let id = raw.id.trim().to_string();
    if id.is_empty() {
        return Err(invalid(model_id, "", "sql element without id"));
    }
    let sql_type: SqlType = raw.sql_type.trim().parse().map_err(|e: String| invalid(model_id, &id, &e))?;

    let cmds: Vec<SqlCmd> = raw
        .cmds
        .into_iter()
        .map(|c| SqlCmd {
            input: c.input.trim().to_string(),
            output: c.output.trim().to_string(),
            sql: NamedSql::compile(c.text.trim()),
        })
        .collect();

    if cmds.is_empty() || cmds.iter().any(|c| c.sql.is_empty()) {
        return Err(invalid(model_id, &id, "every sql needs at least one non-empty cmd"));
    }
    match sql_type {
        SqlType::PagingSelect if cmds.len() != 2 => {
            return Err(invalid(model_id, &id, "pagingselect needs exactly two cmds (count, data)"));
        }
        SqlType::NestedSelect if raw.idfield.trim().is_empty() || raw.pidfield.trim().is_empty() => {
            return Err(invalid(model_id, &id, "nestedselect needs idfield and pidfield"));
        }
        _ => {}
    }

    let transaction = match raw.transaction.trim() {
        "" | "false" | "0" => false,
        "true" | "1" => true,
        other => return Err(invalid(model_id, &id, &format!("invalid transaction flag '{}'", other))),
    };

    Ok(SqlEntity {
        id,
        sql_type,
        idfield: raw.idfield.trim().to_string(),
        pidfield: raw.pidfield.trim().to_string(),
        transaction,
        cmds,
    })
}
