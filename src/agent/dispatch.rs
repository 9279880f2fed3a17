//! Worker lookup by subtask worker type.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::plan::GENERAL_WORKER;
use super::traits::Agent;
use super::worker::WorkerAgent;

/// Registered workers plus the fallback executor.
///
/// Resolution for a worker type is: exact name, then `"general"`, then
/// the default executor. Resolution never fails.
#[derive(Debug)]
pub struct WorkerPool {
    workers: BTreeMap<String, Arc<WorkerAgent>>,
    default_executor: Arc<WorkerAgent>,
}

impl WorkerPool {
    /// Creates an empty pool that resolves everything to `default_executor`.
    #[must_use]
    pub fn new(default_executor: WorkerAgent) -> Self {
        Self {
            workers: BTreeMap::new(),
            default_executor: Arc::new(default_executor),
        }
    }

    /// Registers a worker under its name, replacing any previous one.
    pub fn register(&mut self, worker: WorkerAgent) -> Option<Arc<WorkerAgent>> {
        self.workers
            .insert(worker.name().to_string(), Arc::new(worker))
    }

    /// Resolves the worker for a subtask's worker type.
    #[must_use]
    pub fn resolve(&self, worker_type: &str) -> &Arc<WorkerAgent> {
        self.workers
            .get(worker_type)
            .or_else(|| self.workers.get(GENERAL_WORKER))
            .unwrap_or(&self.default_executor)
    }

    /// Looks up a worker by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<WorkerAgent>> {
        self.workers.get(name)
    }

    /// Registered worker names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.workers.keys().map(String::as_str).collect()
    }

    /// Number of registered workers, excluding the default executor.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether no workers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
