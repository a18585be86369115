//! Evidence files: one immutable row per version, ciphertext in the object
//! store, plaintext checksum verified on every read.

mod store;
mod types;

pub use store::EvidenceStore;
pub use types::{Download, Envelope, Evidence, EvidenceContent, IntegrityReport, UploadRequest};
