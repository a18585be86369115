//! Encrypted evidence archives for batch download.

mod assembler;
mod layout;

pub use assembler::{read_manifest, ArchiveAssembler, ArchiveOutcome, ArchiveRequest};
pub use layout::{
    sanitize_segment, ArchiveLayout, ArchiveManifest, IncludedMember, SkippedMember,
    MANIFEST_NAME, UNLINKED_BUCKET,
};
