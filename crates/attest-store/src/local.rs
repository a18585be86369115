//! Objects as files under a root directory.
//!
//! Writes go to a temporary sibling and are renamed into place, so a reader
//! never observes a half-written object.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::path::ObjectPath;
use crate::traits::{Capabilities, ObjectStore};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root.display().to_string(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &ObjectPath) -> PathBuf {
        // ObjectPath has no empty, `.` or `..` segments, so this stays under root.
        path.segments()
            .fold(self.root.clone(), |acc, seg| acc.join(seg))
    }
}

impl ObjectStore for LocalStore {
    fn put(&self, path: &ObjectPath, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::Misconfigured("object path has no parent".into()))?;
        fs::create_dir_all(parent).map_err(|e| StoreError::io(path.as_str(), e))?;

        let tmp = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(path.as_str(), e));
        }
        debug!(path = %path, size = bytes.len(), "stored object");
        Ok(())
    }

    fn get(&self, path: &ObjectPath) -> Result<Option<Vec<u8>>> {
        match fs::read(self.resolve(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path.as_str(), e)),
        }
    }

    fn exists(&self, path: &ObjectPath) -> Result<bool> {
        self.resolve(path)
            .try_exists()
            .map_err(|e| StoreError::io(path.as_str(), e))
    }

    fn delete(&self, path: &ObjectPath) -> Result<bool> {
        match fs::remove_file(self.resolve(path)) {
            Ok(()) => {
                debug!(path = %path, "deleted object");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path.as_str(), e)),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            provider: "local",
            temporary_urls: false,
        }
    }
}
