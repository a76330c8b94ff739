use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for the dynamic SQL engine, shared by handlers and the file watcher.
#[derive(Clone)]
pub struct Metrics {
    pub statements_executed: Arc<AtomicU64>,
    pub statements_failed: Arc<AtomicU64>,
    pub transactions_committed: Arc<AtomicU64>,
    pub transactions_rolled_back: Arc<AtomicU64>,
    pub models_loaded: Arc<AtomicU64>,
    pub models_failed: Arc<AtomicU64>,
    pub reloads: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            statements_executed: Arc::new(AtomicU64::new(0)),
            statements_failed: Arc::new(AtomicU64::new(0)),
            transactions_committed: Arc::new(AtomicU64::new(0)),
            transactions_rolled_back: Arc::new(AtomicU64::new(0)),
            models_loaded: Arc::new(AtomicU64::new(0)),
            models_failed: Arc::new(AtomicU64::new(0)),
            reloads: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_statements_executed(&self) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_statements_failed(&self) {
        self.statements_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_committed(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rolled_back(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_models_loaded(&self) {
        self.models_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_models_failed(&self) {
        self.models_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reloads(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            statements_executed: self.statements_executed.load(Ordering::Relaxed),
            statements_failed: self.statements_failed.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
            models_loaded: self.models_loaded.load(Ordering::Relaxed),
            models_failed: self.models_failed.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub statements_executed: u64,
    pub statements_failed: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
    pub models_loaded: u64,
    pub models_failed: u64,
    pub reloads: u64,
    pub uptime_seconds: u64,
}
