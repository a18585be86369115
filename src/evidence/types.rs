use chrono::{DateTime, Utc};
use serde::Serialize;

use attest_crypto::EncryptedPayload;
use attest_store::ObjectPath;

use crate::types::TenantId;

/// How a version's stored bytes are protected.
///
/// Rows written before envelope encryption have no key material and are
/// `Plaintext`. Everything written by [`upload`](super::EvidenceStore::upload)
/// is `Encrypted`.
#[derive(Clone, PartialEq, Eq)]
pub enum Envelope {
    Plaintext,
    Encrypted { wrapped_key: Vec<u8>, iv: Vec<u8> },
}

impl Envelope {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Envelope::Encrypted { .. })
    }

    /// Pair stored bytes with this envelope's key material.
    pub fn content(&self, stored: Vec<u8>) -> EvidenceContent {
        match self {
            Envelope::Plaintext => EvidenceContent::Plaintext(stored),
            Envelope::Encrypted { wrapped_key, iv } => EvidenceContent::Encrypted(EncryptedPayload {
                ciphertext: stored,
                wrapped_key: wrapped_key.clone(),
                iv: iv.clone(),
            }),
        }
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Envelope::Plaintext => f.write_str("Plaintext"),
            Envelope::Encrypted { .. } => f.write_str("Encrypted"),
        }
    }
}

/// Stored bytes of one version, tagged by protection mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceContent {
    Plaintext(Vec<u8>),
    Encrypted(EncryptedPayload),
}

/// One immutable version of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub id: i64,
    /// Storage identity; fresh for every version, including reverts.
    pub uuid: String,
    pub tenant_id: TenantId,
    pub audit_id: i64,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub stored_path: ObjectPath,
    /// Hex SHA-256 of the plaintext.
    pub checksum: String,
    pub version: u32,
    pub envelope: Envelope,
    /// Archive grouping; `None` lands in the "unlinked" bucket.
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub uploader_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Evidence {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input to [`EvidenceStore::upload`](super::EvidenceStore::upload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub audit_id: i64,
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl UploadRequest {
    pub fn new(
        audit_id: i64,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            audit_id,
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
            category: None,
            tags: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Verified plaintext plus what a response needs to serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Outcome of a non-raising integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityReport {
    Ok,
    /// No object at the stored path.
    MissingObject,
    /// Decrypted content does not match the recorded checksum.
    Corrupted { expected: String, actual: String },
    /// Key unwrap or cipher failure.
    Undecryptable { reason: String },
    /// Storage or scoping failure; the check could not run.
    Unreadable { reason: String },
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        matches!(self, IntegrityReport::Ok)
    }
}
