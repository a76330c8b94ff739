use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use notify::RecommendedWatcher;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::model::{ModelSql, SqlEntity};
use super::DirectSqlError;
use crate::metrics::Metrics;

struct Root {
    name: String,
    /// Directory as configured, `/`-separated, without a trailing slash.
    dir: String,
    /// Canonical form of `dir`, for absolute paths reported by the watcher.
    canonical: Option<String>,
}

/// All loaded model files keyed by model id.
pub struct ModelSqls {
    roots: Vec<Root>,
    ext: String,
    models: RwLock<HashMap<String, Arc<ModelSql>>>,
    pub(super) watcher: Mutex<Option<RecommendedWatcher>>,
    metrics: Metrics,
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    match path.trim_end_matches('/') {
        "" if path.starts_with('/') => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

impl ModelSqls {
    pub fn new(roots: &HashMap<String, String>, ext: &str, metrics: Metrics) -> Self {
        let mut roots: Vec<Root> = roots
            .iter()
            .map(|(name, dir)| Root {
                name: name.clone(),
                dir: normalize(dir),
                canonical: std::fs::canonicalize(dir).ok().map(|p| normalize(&p.to_string_lossy())),
            })
            .collect();
        // Longest directory first so nested roots win over their parents.
        roots.sort_by(|a, b| b.dir.len().cmp(&a.dir.len()).then_with(|| a.name.cmp(&b.name)));

        Self {
            roots,
            ext: ext.to_string(),
            models: RwLock::new(HashMap::new()),
            watcher: Mutex::new(None),
            metrics,
        }
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    pub fn root_dirs(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|r| PathBuf::from(&r.dir)).collect()
    }

    pub fn has_model_ext(&self, path: &Path) -> bool {
        path.to_string_lossy().ends_with(&self.ext)
    }

    /// `models/biz/demo.msql` under root `biz = models/biz` → `biz/demo`.
    pub fn model_id(&self, path: &Path) -> String {
        let key = normalize(&path.to_string_lossy());
        let key = key.strip_suffix(&self.ext).unwrap_or(&key);
        for root in &self.roots {
            for dir in std::iter::once(&root.dir).chain(root.canonical.as_ref()) {
                if let Some(rest) = key.strip_prefix(dir.as_str()) {
                    if rest.starts_with('/') {
                        return format!("{}{}", root.name, rest);
                    }
                }
            }
        }
        key.to_string()
    }

    /// Maps a model id back to its file: `biz/demo` → `models/biz/demo.msql`.
    pub fn model_path(&self, model_id: &str) -> PathBuf {
        let (head, rest) = model_id.split_once('/').unwrap_or((model_id, ""));
        match self.roots.iter().find(|r| r.name == head) {
            Some(root) if !rest.is_empty() => PathBuf::from(format!("{}/{}{}", root.dir, rest, self.ext)),
            _ => PathBuf::from(format!("{}{}", model_id, self.ext)),
        }
    }

    fn parse_dir(&self, root: &Root, into: &mut HashMap<String, Arc<ModelSql>>) {
        for entry in WalkDir::new(&root.dir).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.dir, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.has_model_ext(entry.path()) {
                continue;
            }
            let id = self.model_id(entry.path());
            match ModelSql::from_file(entry.path(), &id) {
                Ok(model) => {
                    debug!("ModelSql file: {} ------> {} loaded", entry.path().display(), id);
                    self.metrics.inc_models_loaded();
                    into.insert(id, Arc::new(model));
                }
                Err(e) => {
                    self.metrics.inc_models_failed();
                    error!("Failed to load model file {}: {}", entry.path().display(), e);
                }
            }
        }
    }

    /// Walks every root and replaces the whole map. Returns the number of models.
    pub fn load_all(&self) -> usize {
        let mut fresh = HashMap::new();
        for root in &self.roots {
            if !Path::new(&root.dir).is_dir() {
                warn!("Model root '{}' ({}) is not a directory", root.name, root.dir);
                continue;
            }
            self.parse_dir(root, &mut fresh);
        }
        let count = fresh.len();
        *self.models.write().unwrap_or_else(|e| e.into_inner()) = fresh;
        info!("Loaded {} model file(s) from {} root(s)", count, self.roots.len());
        count
    }

    pub fn reload_all(&self) -> usize {
        self.metrics.inc_reloads();
        self.load_all()
    }

    /// Re-parses one file. On failure the previously loaded version stays active.
    pub fn refresh_model_file(&self, path: &Path) -> Result<String, DirectSqlError> {
        let id = self.model_id(path);
        let model = ModelSql::from_file(path, &id).inspect_err(|e| {
            self.metrics.inc_models_failed();
            error!("Failed to refresh model file {}: {}", path.display(), e);
        })?;
        self.metrics.inc_models_loaded();
        self.models.write().unwrap_or_else(|e| e.into_inner()).insert(id.clone(), Arc::new(model));
        info!("Model '{}' refreshed from {}", id, path.display());
        Ok(id)
    }

    pub fn remove_model_file(&self, path: &Path) -> Option<String> {
        let id = self.model_id(path);
        let removed = self.models.write().unwrap_or_else(|e| e.into_inner()).remove(&id);
        removed.map(|_| {
            info!("Model '{}' removed", id);
            id
        })
    }

    pub fn reload_model(&self, model_id: &str) -> Result<String, DirectSqlError> {
        self.metrics.inc_reloads();
        let path = self.model_path(model_id);
        if !path.is_file() {
            return Err(DirectSqlError::ModelNotFound(model_id.to_string()));
        }
        self.refresh_model_file(&path)
    }

    pub fn find_model(&self, model_id: &str) -> Option<Arc<ModelSql>> {
        self.models.read().unwrap_or_else(|e| e.into_inner()).get(model_id).cloned()
    }

    pub fn find_entity(
        &self,
        model_id: &str,
        sql_id: &str,
    ) -> Result<(Arc<ModelSql>, Arc<SqlEntity>), DirectSqlError> {
        debug!("ModelSqlPath: {}, SqlId: {}", model_id, sql_id);
        let model = self.find_model(model_id).ok_or_else(|| DirectSqlError::ModelNotFound(model_id.to_string()))?;
        let entity = model.entity(sql_id).ok_or_else(|| DirectSqlError::SqlNotFound {
            model: model_id.to_string(),
            sql: sql_id.to_string(),
        })?;
        Ok((model, entity))
    }

    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.read().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.models.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
