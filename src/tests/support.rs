//! Shared fixture: a temp directory with one model file and a seeded SQLite file.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::Response;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::{AppConfig, DirectSqlConfig};
use crate::dbservice::DbService;
use crate::directsql::DirectSql;
use crate::metrics::Metrics;
use crate::state::AppState;

pub const DEMO_MODEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<model id="demo">
  <sql id="users" type="select">
    <cmd><![CDATA[SELECT id, name, age FROM users WHERE age >= ?minage ORDER BY id]]></cmd>
  </sql>
  <sql id="page" type="pagingselect">
    <cmd>SELECT COUNT(*) FROM users</cmd>
    <cmd>SELECT name FROM users ORDER BY id LIMIT ?limit OFFSET ?offset</cmd>
  </sql>
  <sql id="tree" type="nestedselect" idfield="id" pidfield="pid">
    <cmd>SELECT id, pid, name FROM menu ORDER BY id</cmd>
  </sql>
  <sql id="multi" type="multiselect">
    <cmd out="people">SELECT name FROM users ORDER BY id</cmd>
    <cmd>SELECT COUNT(*) AS n FROM users</cmd>
  </sql>
  <sql id="add" type="insert">
    <cmd>INSERT INTO users (name, age) VALUES (?name, ?age)</cmd>
  </sql>
  <sql id="rename" type="update">
    <cmd>UPDATE users SET name = ?newname WHERE name = ?name</cmd>
  </sql>
  <sql id="remove" type="delete">
    <cmd>DELETE FROM users WHERE name = ?name</cmd>
  </sql>
  <sql id="addlogged" type="insert" transaction="true">
    <cmd>INSERT INTO log (msg) VALUES (?name)</cmd>
    <cmd>INSERT INTO users (name, age) VALUES (?name, ?age)</cmd>
  </sql>
  <sql id="batchadd" type="batchinsert">
    <cmd>INSERT INTO users (name, age) VALUES (?name, ?age)</cmd>
  </sql>
  <sql id="complex" type="batchcomplex">
    <cmd in="users">INSERT INTO users (name, age) VALUES (?name, ?age)</cmd>
    <cmd in="logs">INSERT INTO log (msg) VALUES (?msg)</cmd>
  </sql>
  <sql id="newdoc" type="insertpro" idfield="id">
    <cmd>INSERT INTO docs (id, title) VALUES (?id, ?title)</cmd>
  </sql>
</model>
"#;

const SCHEMA: [&str; 7] = [
    "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, age INTEGER)",
    "CREATE TABLE menu (id TEXT PRIMARY KEY, pid TEXT, name TEXT)",
    "CREATE TABLE log (msg TEXT NOT NULL)",
    "CREATE TABLE docs (id TEXT PRIMARY KEY, title TEXT)",
    "INSERT INTO users (name, age) VALUES ('alice', 30), ('bob', 25), ('carol', 41)",
    "INSERT INTO menu (id, pid, name) VALUES ('1', NULL, 'File'), ('2', '1', 'Open'), ('3', '1', 'Save')",
    "INSERT INTO menu (id, pid, name) VALUES ('4', NULL, 'Edit'), ('5', '2', 'Recent')",
];

pub struct Fixture {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub dbs: DbService,
    pub directsql: DirectSql,
    pub metrics: Metrics,
    pub config: AppConfig,
}

impl Fixture {
    pub fn state(&self) -> AppState {
        AppState::new(self.config.clone(), self.dbs.clone(), self.directsql.clone(), self.metrics.clone())
    }

    /// State carrying `config` instead of the fixture's own.
    pub fn state_with(&self, config: AppConfig) -> AppState {
        AppState::new(config, self.dbs.clone(), self.directsql.clone(), self.metrics.clone())
    }

    pub fn model_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("models/biz")
    }
}

pub async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let model_dir = dir.path().join("models/biz");
    std::fs::create_dir_all(&model_dir).unwrap();
    std::fs::write(model_dir.join("demo.msql"), DEMO_MODEL).unwrap();

    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let pool = SqlitePool::connect(&url).await.unwrap();
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    let dbs = DbService::from_pools("main", vec![("main".to_string(), url, pool.clone())]).unwrap();

    let mut config = AppConfig::default();
    config.directsql = DirectSqlConfig {
        roots: HashMap::from([("biz".to_string(), model_dir.display().to_string())]),
        ..DirectSqlConfig::default()
    };
    let metrics = Metrics::new();
    let directsql = DirectSql::from_config(&config.directsql, dbs.clone(), metrics.clone()).unwrap();

    Fixture { dir, pool, dbs, directsql, metrics, config }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
