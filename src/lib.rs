//! Evidence vault: envelope-encrypted, versioned evidence files with a
//! signed, append-only audit trail and encrypted batch archives.

pub mod archive;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod evidence;
pub mod types;
pub mod vault;

pub use archive::{ArchiveAssembler, ArchiveManifest, ArchiveOutcome, ArchiveRequest};
pub use audit::{AuditEvent, AuditFilter, AuditLogEntry, AuditPayload, AuditTrail, PayloadValue};
pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use evidence::{Download, Evidence, EvidenceStore, IntegrityReport, UploadRequest};
pub use types::{ActorContext, Page, Paginated, TenantId, Timestamp};
pub use vault::Vault;

pub use attest_crypto;
pub use attest_store;
