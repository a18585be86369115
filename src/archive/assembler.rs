use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use attest_crypto::CryptoEnvelope;
use attest_store::{ensure_scoped, export_path, export_prefix, ObjectPath, ObjectStore};

use super::layout::{
    ArchiveLayout, ArchiveManifest, IncludedMember, SkippedMember, MANIFEST_FORMAT, MANIFEST_NAME,
};
use crate::audit::{actions, AuditEvent, AuditTrail};
use crate::config::Compression;
use crate::db::Database;
use crate::error::{Result, VaultError};
use crate::evidence::{Evidence, EvidenceStore};
use crate::types::{format_timestamp, now, ActorContext, TenantId};

/// What goes into one archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveRequest {
    pub audit_id: i64,
    pub members: Vec<Evidence>,
    /// Already-rendered documents (name, bytes), stored under `documents/`.
    pub documents: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    /// Where the encrypted archive was stored.
    pub stored_path: ObjectPath,
    pub included: usize,
    pub skipped: Vec<SkippedMember>,
    /// Size of the zip before the outer encryption.
    pub size_bytes: u64,
}

fn archive_err(e: impl std::fmt::Display) -> VaultError {
    VaultError::Archive(e.to_string())
}

/// Short, log-safe reason for a skipped member.
fn skip_reason(err: &VaultError) -> &'static str {
    match err {
        VaultError::NotFound(_) => "stored object missing",
        VaultError::Integrity(_) => "checksum mismatch",
        VaultError::Crypto(_) => "decryption failed",
        VaultError::PathOutsideTenant { .. } => "outside tenant",
        VaultError::Storage(_) => "storage unavailable",
        _ => "unreadable",
    }
}

/// Read `manifest.json` back out of decrypted archive bytes.
pub fn read_manifest(zip_bytes: &[u8]) -> Result<ArchiveManifest> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).map_err(archive_err)?;
    let mut file = archive.by_name(MANIFEST_NAME).map_err(archive_err)?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw).map_err(archive_err)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Bundles decrypted evidence and rendered documents into a zip, then
/// encrypts the zip as a whole and stores it under the tenant's exports.
pub struct ArchiveAssembler {
    db: Arc<Database>,
    evidence: Arc<EvidenceStore>,
    objects: Arc<dyn ObjectStore>,
    envelope: Arc<CryptoEnvelope>,
    audit: Arc<AuditTrail>,
    compression: Compression,
}

impl ArchiveAssembler {
    pub fn new(
        db: Arc<Database>,
        evidence: Arc<EvidenceStore>,
        objects: Arc<dyn ObjectStore>,
        envelope: Arc<CryptoEnvelope>,
        audit: Arc<AuditTrail>,
        compression: Compression,
    ) -> Self {
        Self {
            db,
            evidence,
            objects,
            envelope,
            audit,
            compression,
        }
    }

    /// Build, encrypt and store an archive.
    ///
    /// A member that cannot be read is skipped, logged and listed in the
    /// manifest. Failures of the container itself, the outer encryption or
    /// the store abort the whole build.
    pub fn build_archive(&self, request: ArchiveRequest, ctx: &ActorContext) -> Result<ArchiveOutcome> {
        let tenant = ctx.tenant_id;
        let options = FileOptions::default().compression_method(self.compression.into());
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut layout = ArchiveLayout::new();
        let mut included = Vec::new();
        let mut skipped = Vec::new();

        for member in &request.members {
            let content = if member.tenant_id != tenant {
                Err((
                    "outside tenant",
                    VaultError::PathOutsideTenant {
                        path: member.stored_path.to_string(),
                        tenant: tenant.to_string(),
                    },
                ))
            } else if member.is_deleted() {
                Err((
                    "deleted",
                    VaultError::NotFound(format!("evidence {} is deleted", member.id)),
                ))
            } else {
                self.evidence
                    .get_decrypted_content(member)
                    .map_err(|e| (skip_reason(&e), e))
            };
            let bytes = match content {
                Ok(bytes) => bytes,
                Err((reason, e)) => {
                    warn!(
                        evidence_id = member.id,
                        filename = %member.filename,
                        reason,
                        error = %e,
                        "skipping archive member"
                    );
                    skipped.push(SkippedMember {
                        evidence_id: member.id,
                        filename: member.filename.clone(),
                        reason: reason.to_string(),
                    });
                    continue;
                }
            };

            let path = layout.evidence_entry(
                member.category.as_deref(),
                &member.filename,
                member.version,
                member.id,
            );
            zip.start_file(path.as_str(), options).map_err(archive_err)?;
            zip.write_all(&bytes).map_err(archive_err)?;
            included.push(IncludedMember {
                evidence_id: member.id,
                path,
                filename: member.filename.clone(),
                version: member.version,
                checksum: member.checksum.clone(),
            });
        }

        let mut documents = Vec::with_capacity(request.documents.len());
        for (name, bytes) in &request.documents {
            let path = layout.document_entry(name);
            zip.start_file(path.as_str(), options).map_err(archive_err)?;
            zip.write_all(bytes).map_err(archive_err)?;
            documents.push(path);
        }

        let created_at = now();
        let manifest = ArchiveManifest {
            format: MANIFEST_FORMAT,
            tenant_id: tenant,
            audit_id: request.audit_id,
            created_at: format_timestamp(&created_at),
            included,
            documents,
            skipped,
        };
        zip.start_file(MANIFEST_NAME, options).map_err(archive_err)?;
        zip.write_all(&serde_json::to_vec_pretty(&manifest)?)
            .map_err(archive_err)?;
        let zip_bytes = zip.finish().map_err(archive_err)?.into_inner();

        let sealed = self.envelope.encrypt_to_transport(&zip_bytes)?;
        let stored_path = export_path(
            tenant,
            "audit",
            &request.audit_id.to_string(),
            created_at.timestamp_micros(),
            "zip",
        )?;
        self.objects.put(&stored_path, sealed.as_bytes())?;

        let recorded = self.db.write(|tx| {
            self.audit.record_in(
                tx,
                AuditEvent::new(actions::EXPORTED, "audit", Some(request.audit_id))
                    .with("path", stored_path.as_str())
                    .with("included", manifest.included.len())
                    .with("documents", manifest.documents.len())
                    .with("skipped", manifest.skipped.len()),
                ctx,
            )
        });
        if let Err(e) = recorded {
            if let Err(cleanup) = self.objects.delete(&stored_path) {
                warn!(path = %stored_path, error = %cleanup, "failed to clean up unaudited archive");
            }
            return Err(e);
        }

        info!(
            tenant = %tenant,
            audit_id = request.audit_id,
            path = %stored_path,
            included = manifest.included.len(),
            skipped = manifest.skipped.len(),
            "archive stored"
        );
        Ok(ArchiveOutcome {
            stored_path,
            included: manifest.included.len(),
            skipped: manifest.skipped,
            size_bytes: zip_bytes.len() as u64,
        })
    }

    /// Fetch and decrypt a stored archive back to zip bytes.
    pub fn open_archive(&self, tenant: TenantId, path: &ObjectPath) -> Result<Vec<u8>> {
        ensure_scoped(path, &export_prefix(tenant)).map_err(|_| VaultError::PathOutsideTenant {
            path: path.to_string(),
            tenant: tenant.to_string(),
        })?;
        let stored = self
            .objects
            .get(path)?
            .ok_or_else(|| VaultError::NotFound(format!("archive {}", path)))?;
        let encoded = String::from_utf8(stored)
            .map_err(|_| VaultError::Archive("stored archive is not a transport encoding".into()))?;
        Ok(self.envelope.decrypt_transport(&encoded)?)
    }
}

impl std::fmt::Debug for ArchiveAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveAssembler")
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}
