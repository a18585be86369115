use crate::error::Result;
use crate::path::ObjectPath;

/// What a provider can do beyond plain reads and writes.
///
/// Decided once when the provider is built, so call sites branch on a flag
/// rather than probing the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Provider name for logs ("local", "memory").
    pub provider: &'static str,
    /// Whether downloads should go through time-limited URLs.
    pub temporary_urls: bool,
}

/// Opaque byte storage addressed by [`ObjectPath`].
///
/// Implementations must be thread-safe. `put` overwrites; callers choose
/// unique paths per version. Not-found is a value, never an error.
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` at `path`, replacing any existing object.
    fn put(&self, path: &ObjectPath, bytes: &[u8]) -> Result<()>;

    /// Read the object at `path`, or `None` if absent.
    fn get(&self, path: &ObjectPath) -> Result<Option<Vec<u8>>>;

    fn exists(&self, path: &ObjectPath) -> Result<bool>;

    /// Remove the object. Returns whether something was removed.
    fn delete(&self, path: &ObjectPath) -> Result<bool>;

    fn capabilities(&self) -> Capabilities;
}
