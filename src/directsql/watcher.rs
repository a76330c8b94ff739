//! Filesystem watcher keeping the registry in sync with model files on disk.

use std::path::Path;
use std::sync::{Arc, Weak};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info};

use super::registry::ModelSqls;
use super::DirectSqlError;

impl ModelSqls {
    /// Watches every root recursively. Calling it again replaces the previous watcher.
    pub fn start_watcher(self: &Arc<Self>) -> Result<(), DirectSqlError> {
        let registry: Weak<ModelSqls> = Arc::downgrade(self);
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(registry) = registry.upgrade() {
                        registry.apply_event(&event);
                    }
                }
                Err(e) => error!("Model watcher error: {}", e),
            },
            Config::default(),
        )?;

        for dir in self.root_dirs() {
            if dir.is_dir() {
                watcher.watch(&dir, RecursiveMode::Recursive)?;
                info!("Watching model root {}", dir.display());
            }
        }

        *self.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(watcher);
        Ok(())
    }

    pub fn stop_watcher(&self) {
        if self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take().is_some() {
            info!("Model watcher stopped");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Applies one filesystem event. Paths without the model extension are ignored.
    pub fn apply_event(&self, event: &Event) {
        debug!("Model watcher event: {:?}", event);
        match event.kind {
            EventKind::Create(_) => self.each_model(event, |p| self.refresh(p)),
            EventKind::Remove(_) => self.each_model(event, |p| self.remove(p)),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => self.each_model(event, |p| self.remove(p)),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => self.each_model(event, |p| self.refresh(p)),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to, ..] = event.paths.as_slice() {
                    if self.has_model_ext(from) {
                        self.remove(from);
                    }
                    if self.has_model_ext(to) {
                        self.refresh(to);
                    }
                }
            }
            // Backends that cannot tell the rename direction: decide by existence.
            EventKind::Modify(ModifyKind::Name(_)) => self.each_model(event, |p| {
                if p.exists() {
                    self.refresh(p)
                } else {
                    self.remove(p)
                }
            }),
            EventKind::Modify(ModifyKind::Metadata(_)) => {}
            EventKind::Modify(_) => self.each_model(event, |p| self.refresh(p)),
            _ => {}
        }
    }

    fn each_model(&self, event: &Event, f: impl Fn(&Path)) {
        event.paths.iter().filter(|p| self.has_model_ext(p)).for_each(|p| f(p));
    }

    fn refresh(&self, path: &Path) {
        if path.is_file() {
            // Errors are logged by the registry; the old model stays active.
            let _ = self.refresh_model_file(path);
        }
    }

    fn remove(&self, path: &Path) {
        self.remove_model_file(path);
    }
}
