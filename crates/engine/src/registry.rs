//! Table of live executors, keyed by upload id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::executor::UploadExecutor;

/// Lock-guarded map from upload id to executor. Cloning shares the table.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<UploadExecutor>>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `executor` under its id. Returns `false` if the id is taken,
    /// leaving the existing entry in place.
    pub fn register(&self, executor: Arc<UploadExecutor>) -> bool {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(executor.id()) {
            return false;
        }
        map.insert(executor.id().to_string(), executor);
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<UploadExecutor>> {
        self.inner.lock().unwrap().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<UploadExecutor>> {
        self.inner.lock().unwrap().remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }
}
