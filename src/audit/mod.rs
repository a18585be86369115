//! Signed, append-only audit trail.
//!
//! Every entry carries an HMAC-SHA256 over a canonical, key-sorted JSON
//! serialization of its fields, prefixed with a versioned domain separator.
//! Verification recomputes that message from the stored fields and compares
//! in constant time.

mod export;
mod trail;
mod types;

pub use export::{entries_to_csv, entries_to_json};
pub use trail::{verify_entry, AuditTrail};
pub use types::{
    AuditEvent, AuditFilter, AuditLogEntry, AuditPayload, PayloadValue, VerifiedEntry,
};

/// Action tags recorded by the evidence and archive components.
pub mod actions {
    pub const UPLOADED: &str = "uploaded";
    pub const IMPORTED: &str = "imported";
    pub const DOWNLOADED: &str = "downloaded";
    pub const REVERTED: &str = "reverted";
    pub const DELETED: &str = "deleted";
    pub const PURGED: &str = "purged";
    pub const EXPORTED: &str = "exported";
}
