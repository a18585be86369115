//! An ObjectStore that holds every object in a HashMap.
//!
//! Used for tests and single-process deployments that do not need
//! durability. Interior mutability via `parking_lot::Mutex`.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::Result;
use crate::path::ObjectPath;
use crate::traits::{Capabilities, ObjectStore};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, path: &ObjectPath, bytes: &[u8]) -> Result<()> {
        self.objects
            .lock()
            .insert(path.as_str().to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, path: &ObjectPath) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().get(path.as_str()).cloned())
    }

    fn exists(&self, path: &ObjectPath) -> Result<bool> {
        Ok(self.objects.lock().contains_key(path.as_str()))
    }

    fn delete(&self, path: &ObjectPath) -> Result<bool> {
        Ok(self.objects.lock().remove(path.as_str()).is_some())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            provider: "memory",
            temporary_urls: false,
        }
    }
}
