//! Provider selection from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::local::LocalStore;
use crate::memory::MemoryStore;
use crate::traits::ObjectStore;

/// `[storage]` configuration table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum StorageProvider {
    /// Files under `root`.
    Local { root: PathBuf },
    /// Process-local HashMap.
    #[default]
    Memory,
}

impl StorageProvider {
    /// Build the configured provider.
    pub fn open(&self) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match self {
            StorageProvider::Local { root } => {
                if root.as_os_str().is_empty() {
                    return Err(StoreError::Misconfigured("local root is empty".into()));
                }
                Arc::new(LocalStore::open(root.clone())?)
            }
            StorageProvider::Memory => Arc::new(MemoryStore::new()),
        };
        let caps = store.capabilities();
        info!(
            provider = caps.provider,
            temporary_urls = caps.temporary_urls,
            "object store ready"
        );
        Ok(store)
    }
}
