//! DBService: named SQLite connection pools with a switchable default.
//!
//! Pools are opened once from [`DbServiceConfig`]. A database that fails to open is
//! logged and left out so the remaining ones stay usable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{self, DbConfig, DbServiceConfig};

#[derive(Debug, Error)]
pub enum DbServiceError {
    #[error("Specified database does not exist: {0}.")]
    UnknownDatabase(String),
    #[error("no configured database could be opened")]
    NoneOpened,
}

struct Entry {
    url: String,
    pool: SqlitePool,
}

struct Inner {
    entries: HashMap<String, Entry>,
    default: RwLock<String>,
}

/// Registry of initialized pools. Cheap to clone.
#[derive(Clone)]
pub struct DbService {
    inner: Arc<Inner>,
}

impl DbService {
    /// Opens every configured database.
    ///
    /// The configured default wins if it opened; otherwise the first database that
    /// opened becomes the default.
    pub async fn init(cfg: &DbServiceConfig) -> anyhow::Result<Self> {
        let mut opened = Vec::new();
        for db in &cfg.databases {
            match open_pool(db).await {
                Ok(pool) => {
                    info!("Database '{}' opened ({})", db.name, db.url);
                    opened.push((db.name.clone(), db.url.clone(), pool));
                }
                Err(e) => error!("Failed to open database '{}': {:#}", db.name, e),
            }
        }
        Ok(Self::from_pools(&cfg.default, opened)?)
    }

    /// Builds the registry from already opened pools, given as `(name, url, pool)`.
    pub fn from_pools(
        default: &str,
        pools: Vec<(String, String, SqlitePool)>,
    ) -> Result<Self, DbServiceError> {
        let first = pools.first().map(|(name, _, _)| name.clone()).ok_or(DbServiceError::NoneOpened)?;
        let entries: HashMap<String, Entry> =
            pools.into_iter().map(|(name, url, pool)| (name, Entry { url, pool })).collect();
        let default = if entries.contains_key(default) {
            default.to_string()
        } else {
            warn!("Default database '{}' unavailable, falling back to '{}'", default, first);
            first
        };
        Ok(Self { inner: Arc::new(Inner { entries, default: RwLock::new(default) }) })
    }

    pub fn default_name(&self) -> String {
        self.inner.default.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The default pool.
    pub fn default_db(&self) -> SqlitePool {
        let name = self.default_name();
        // The default always names an entry: it is only ever set to existing keys.
        self.inner.entries[&name].pool.clone()
    }

    pub fn get_db(&self, name: &str) -> Option<SqlitePool> {
        self.inner.entries.get(name).map(|e| e.pool.clone())
    }

    /// The named pool, or the default one when `name` is empty or unknown.
    pub fn resolve(&self, name: &str) -> SqlitePool {
        self.get_db(name).unwrap_or_else(|| self.default_db())
    }

    /// All pools, sorted by name.
    pub fn db_list(&self) -> Vec<(String, SqlitePool)> {
        let mut list: Vec<_> =
            self.inner.entries.iter().map(|(name, e)| (name.clone(), e.pool.clone())).collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    pub fn default_connstring(&self) -> String {
        let name = self.default_name();
        self.inner.entries[&name].url.clone()
    }

    pub fn set_default(&self, name: &str) -> Result<(), DbServiceError> {
        if !self.inner.entries.contains_key(name) {
            return Err(DbServiceError::UnknownDatabase(name.to_string()));
        }
        *self.inner.default.write().unwrap_or_else(|e| e.into_inner()) = name.to_string();
        Ok(())
    }

    /// Runs `f` on a connection of the named pool (default pool for `None`).
    pub async fn db_callback<T, E, F>(&self, name: Option<&str>, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, E>>,
        E: From<sqlx::Error>,
    {
        let pool = match name {
            Some(name) => self.resolve(name),
            None => self.default_db(),
        };
        let mut conn = pool.acquire().await?;
        f(&mut conn).await
    }
}

/// Runs `f` inside a transaction: commit on `Ok`, rollback on `Err`.
pub async fn transact<T, E, F>(pool: &SqlitePool, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, E>>,
    E: From<sqlx::Error>,
{
    let mut tx = pool.begin().await?;
    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                error!("Rollback failed: {}", rb);
            }
            Err(e)
        }
    }
}

async fn open_pool(db: &DbConfig) -> anyhow::Result<SqlitePool> {
    let in_memory = db.url.contains(":memory:");
    if !in_memory {
        config::ensure_sqlite_parent_dir(&db.url)?;
        if !Sqlite::database_exists(&db.url).await.unwrap_or(false) {
            info!("Creating SQLite database at {}", db.url);
            Sqlite::create_database(&db.url).await?;
        }
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(db.max_open_conns)
        .min_connections(db.max_idle_conns.min(db.max_open_conns))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Foreign keys are required; a connection without them is refused.
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await {
                    warn!("Failed to set busy_timeout: {}", e);
                }
                Ok(())
            })
        })
        .connect(&db.url)
        .await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn db_config(dir: &TempDir, name: &str) -> DbConfig {
        DbConfig {
            name: name.to_string(),
            url: format!("sqlite://{}", dir.path().join(format!("{name}/{name}.db")).display()),
            max_open_conns: 2,
            max_idle_conns: 1,
        }
    }

    #[tokio::test]
    async fn test_init_opens_all_and_picks_default() {
        let dir = TempDir::new().unwrap();
        let cfg = DbServiceConfig {
            default: "second".to_string(),
            databases: vec![db_config(&dir, "first"), db_config(&dir, "second")],
        };
        let svc = DbService::init(&cfg).await.unwrap();

        assert_eq!(svc.default_name(), "second");
        assert!(svc.default_connstring().ends_with("second/second.db"));
        let names: Vec<String> = svc.db_list().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
        assert!(svc.get_db("first").is_some());
        assert!(svc.get_db("missing").is_none());
    }

    #[tokio::test]
    async fn test_connections_enforce_foreign_keys() {
        let dir = TempDir::new().unwrap();
        let cfg = DbServiceConfig { default: "fk".to_string(), databases: vec![db_config(&dir, "fk")] };
        let pool = DbService::init(&cfg).await.unwrap().default_db();

        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.unwrap();
        assert_eq!(fk, 1);
        let busy: i64 = sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.unwrap();
        assert_eq!(busy, 10000);

        sqlx::query("CREATE TABLE parent (id INTEGER PRIMARY KEY)").execute(&pool).await.unwrap();
        sqlx::query("CREATE TABLE child (pid INTEGER REFERENCES parent(id))").execute(&pool).await.unwrap();
        let orphan = sqlx::query("INSERT INTO child (pid) VALUES (42)").execute(&pool).await;
        assert!(orphan.is_err());
    }

    #[tokio::test]
    async fn test_set_default() {
        let dir = TempDir::new().unwrap();
        let cfg = DbServiceConfig {
            default: "first".to_string(),
            databases: vec![db_config(&dir, "first"), db_config(&dir, "second")],
        };
        let svc = DbService::init(&cfg).await.unwrap();

        svc.set_default("second").unwrap();
        assert_eq!(svc.default_name(), "second");

        let err = svc.set_default("nope").unwrap_err();
        assert_eq!(err.to_string(), "Specified database does not exist: nope.");
        assert_eq!(svc.default_name(), "second");
    }

    #[tokio::test]
    async fn test_unknown_default_falls_back_to_first() {
        let dir = TempDir::new().unwrap();
        let cfg = DbServiceConfig { default: "ghost".to_string(), databases: vec![db_config(&dir, "only")] };
        let svc = DbService::init(&cfg).await.unwrap();
        assert_eq!(svc.default_name(), "only");
    }

    #[tokio::test]
    async fn test_transact_commits_and_rolls_back() {
        let dir = TempDir::new().unwrap();
        let cfg = DbServiceConfig { default: "t".to_string(), databases: vec![db_config(&dir, "t")] };
        let svc = DbService::init(&cfg).await.unwrap();
        let pool = svc.default_db();
        sqlx::query("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)").execute(&pool).await.unwrap();

        transact::<_, sqlx::Error, _>(&pool, |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO kv VALUES ('a', 1)").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        let failed = transact::<(), sqlx::Error, _>(&pool, |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO kv VALUES ('b', 2)").execute(&mut *conn).await?;
                sqlx::query("INSERT INTO kv VALUES ('a', 3)").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .await;
        assert!(failed.is_err());

        let count: i64 = svc
            .db_callback::<_, sqlx::Error, _>(None, |conn| {
                Box::pin(async move { sqlx::query_scalar("SELECT COUNT(*) FROM kv").fetch_one(&mut *conn).await })
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
