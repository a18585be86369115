//! Object storage: provider trait, local/memory providers, tenant-scoped paths.

pub mod error;
pub mod local;
pub mod memory;
pub mod path;
pub mod provider;
pub mod traits;

pub use error::StoreError;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use path::{
    ensure_scoped, evidence_path, evidence_prefix, export_path, export_prefix, ObjectPath,
    TenantId,
};
pub use provider::StorageProvider;
pub use traits::{Capabilities, ObjectStore};
