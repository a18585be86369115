//! Versioned, envelope-encrypted evidence storage.

use std::sync::Arc;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

use attest_crypto::{checksum, ensure_checksum, CryptoEnvelope};
use attest_store::{ensure_scoped, evidence_path, evidence_prefix, ObjectPath, ObjectStore};

use super::types::{Download, Envelope, Evidence, EvidenceContent, IntegrityReport, UploadRequest};
use crate::audit::{actions, AuditEvent, AuditTrail};
use crate::db::{conversion_error, is_unique_violation, Database};
use crate::error::{Result, VaultError};
use crate::types::{format_timestamp, now, parse_timestamp, ActorContext, TenantId};

/// Attempts at claiming a version number before giving up. Only a writer
/// that bypasses `BEGIN IMMEDIATE` can make the first attempt collide.
const MAX_WRITE_ATTEMPTS: u32 = 3;

const MAX_FILENAME_LEN: usize = 255;

const EVIDENCE_COLUMNS: &str = "id, uuid, tenant_id, audit_id, filename, mime_type, size_bytes, \
                                stored_path, checksum, version, wrapped_key, iv, category, tags, \
                                uploader_id, created_at, deleted_at";

fn evidence_from_row(row: &Row<'_>) -> rusqlite::Result<Evidence> {
    let stored_path: String = row.get(7)?;
    let wrapped_key: Option<Vec<u8>> = row.get(10)?;
    let iv: Option<Vec<u8>> = row.get(11)?;
    let tags: String = row.get(13)?;
    let created_at: String = row.get(15)?;
    let deleted_at: Option<String> = row.get(16)?;

    let envelope = match (wrapped_key, iv) {
        (Some(wrapped_key), Some(iv)) => Envelope::Encrypted { wrapped_key, iv },
        (None, None) => Envelope::Plaintext,
        _ => return Err(rusqlite::Error::InvalidColumnType(10, "wrapped_key".into(), Type::Null)),
    };

    Ok(Evidence {
        id: row.get(0)?,
        uuid: row.get(1)?,
        tenant_id: TenantId(row.get(2)?),
        audit_id: row.get(3)?,
        filename: row.get(4)?,
        mime_type: row.get(5)?,
        size_bytes: row.get(6)?,
        stored_path: ObjectPath::parse(stored_path).map_err(|e| conversion_error(7, e))?,
        checksum: row.get(8)?,
        version: row.get(9)?,
        envelope,
        category: row.get(12)?,
        tags: serde_json::from_str(&tags).map_err(|e| conversion_error(13, e))?,
        uploader_id: row.get(14)?,
        created_at: parse_timestamp(&created_at).map_err(|e| conversion_error(15, e))?,
        deleted_at: deleted_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| conversion_error(16, e))?,
    })
}

fn find_in(conn: &Connection, tenant: TenantId, id: i64) -> Result<Option<Evidence>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM evidences WHERE id = ?1 AND tenant_id = ?2",
                EVIDENCE_COLUMNS
            ),
            params![id, tenant.0],
            evidence_from_row,
        )
        .optional()?)
}

/// Fields of a version about to be written. The version number, uuid and
/// path are assigned inside the write transaction.
struct NewVersion<'a> {
    tenant_id: TenantId,
    audit_id: i64,
    filename: &'a str,
    mime_type: &'a str,
    size_bytes: u64,
    checksum: &'a str,
    envelope: &'a Envelope,
    stored: &'a [u8],
    category: Option<&'a str>,
    tags: &'a [String],
    uploader_id: Option<i64>,
}

fn validate_upload(req: &UploadRequest) -> Result<()> {
    let name = req.filename.trim();
    if name.is_empty() {
        return Err(VaultError::InvalidInput("filename is required".into()));
    }
    if req.filename.len() > MAX_FILENAME_LEN {
        return Err(VaultError::InvalidInput(format!(
            "filename longer than {} bytes",
            MAX_FILENAME_LEN
        )));
    }
    if req.filename.chars().any(char::is_control) {
        return Err(VaultError::InvalidInput(
            "filename contains control characters".into(),
        ));
    }
    if req.mime_type.trim().is_empty() {
        return Err(VaultError::InvalidInput("mime type is required".into()));
    }
    Ok(())
}

/// Uploads, versions and retrieves evidence files.
///
/// Every mutating call and every download records an audit entry in the
/// same database transaction as the change it describes.
pub struct EvidenceStore {
    db: Arc<Database>,
    objects: Arc<dyn ObjectStore>,
    envelope: Arc<CryptoEnvelope>,
    audit: Arc<AuditTrail>,
}

impl EvidenceStore {
    pub fn new(
        db: Arc<Database>,
        objects: Arc<dyn ObjectStore>,
        envelope: Arc<CryptoEnvelope>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            db,
            objects,
            envelope,
            audit,
        }
    }

    /// Encrypt and store a new version of `req.filename` under `req.audit_id`.
    ///
    /// Either the row, its stored object and its audit entry all exist
    /// afterwards, or none of them do (object cleanup is best-effort).
    pub fn upload(&self, req: UploadRequest, ctx: &ActorContext) -> Result<Evidence> {
        validate_upload(&req)?;
        let digest = checksum(&req.bytes);
        let payload = self.envelope.encrypt(&req.bytes)?;
        let envelope = Envelope::Encrypted {
            wrapped_key: payload.wrapped_key,
            iv: payload.iv,
        };
        let new = NewVersion {
            tenant_id: ctx.tenant_id,
            audit_id: req.audit_id,
            filename: &req.filename,
            mime_type: &req.mime_type,
            size_bytes: req.bytes.len() as u64,
            checksum: &digest,
            envelope: &envelope,
            stored: &payload.ciphertext,
            category: req.category.as_deref(),
            tags: &req.tags,
            uploader_id: ctx.user_id,
        };
        let evidence = self.persist(&new, ctx, |ev| {
            AuditEvent::new(actions::UPLOADED, "evidence", Some(ev.id))
                .with("audit_id", ev.audit_id)
                .with("filename", ev.filename.as_str())
                .with("version", ev.version)
                .with("checksum", ev.checksum.as_str())
                .with("size_bytes", ev.size_bytes)
        })?;
        info!(
            tenant = %evidence.tenant_id,
            audit_id = evidence.audit_id,
            evidence_id = evidence.id,
            version = evidence.version,
            "evidence uploaded"
        );
        Ok(evidence)
    }

    /// Store a pre-encryption file as-is, with no key material.
    ///
    /// Used when migrating data that predates envelope encryption.
    pub fn import_legacy(&self, req: UploadRequest, ctx: &ActorContext) -> Result<Evidence> {
        validate_upload(&req)?;
        let digest = checksum(&req.bytes);
        let new = NewVersion {
            tenant_id: ctx.tenant_id,
            audit_id: req.audit_id,
            filename: &req.filename,
            mime_type: &req.mime_type,
            size_bytes: req.bytes.len() as u64,
            checksum: &digest,
            envelope: &Envelope::Plaintext,
            stored: &req.bytes,
            category: req.category.as_deref(),
            tags: &req.tags,
            uploader_id: ctx.user_id,
        };
        let evidence = self.persist(&new, ctx, |ev| {
            AuditEvent::new(actions::IMPORTED, "evidence", Some(ev.id))
                .with("audit_id", ev.audit_id)
                .with("filename", ev.filename.as_str())
                .with("version", ev.version)
                .with("checksum", ev.checksum.as_str())
        })?;
        info!(
            tenant = %evidence.tenant_id,
            evidence_id = evidence.id,
            "legacy evidence imported"
        );
        Ok(evidence)
    }

    /// Fetch one row, scoped to `tenant`. Soft-deleted rows are returned.
    pub fn find(&self, tenant: TenantId, id: i64) -> Result<Evidence> {
        self.db
            .read(|conn| find_in(conn, tenant, id))?
            .ok_or_else(|| VaultError::NotFound(format!("evidence {}", id)))
    }

    /// Latest non-deleted version of every file under `audit_id`, by filename.
    pub fn list_latest(&self, tenant: TenantId, audit_id: i64) -> Result<Vec<Evidence>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {cols} FROM evidences e
                 WHERE e.tenant_id = ?1 AND e.audit_id = ?2 AND e.deleted_at IS NULL
                   AND e.version = (
                       SELECT MAX(x.version) FROM evidences x
                       WHERE x.tenant_id = e.tenant_id AND x.audit_id = e.audit_id
                         AND x.filename = e.filename AND x.deleted_at IS NULL)
                 ORDER BY e.filename",
                cols = EVIDENCE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![tenant.0, audit_id], evidence_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Every version sharing `evidence`'s audit and filename, oldest first.
    pub fn get_versions(&self, evidence: &Evidence) -> Result<Vec<Evidence>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM evidences
                 WHERE tenant_id = ?1 AND audit_id = ?2 AND filename = ?3
                 ORDER BY version ASC",
                EVIDENCE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![evidence.tenant_id.0, evidence.audit_id, evidence.filename],
                    evidence_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Decrypt, verify and return `evidence` for an end user.
    ///
    /// The row is reloaded under the actor's tenant, so a record from
    /// another tenant is simply not found. Soft-deleted versions are not
    /// served.
    pub fn download(&self, evidence: &Evidence, ctx: &ActorContext) -> Result<Download> {
        let evidence = self.find(ctx.tenant_id, evidence.id)?;
        if evidence.is_deleted() {
            return Err(VaultError::NotFound(format!("evidence {}", evidence.id)));
        }
        let bytes = self.get_decrypted_content(&evidence)?;
        self.db.write(|tx| {
            self.audit.record_in(
                tx,
                AuditEvent::new(actions::DOWNLOADED, "evidence", Some(evidence.id))
                    .with("filename", evidence.filename.as_str())
                    .with("version", evidence.version),
                ctx,
            )
        })?;
        Ok(Download {
            filename: evidence.filename,
            mime_type: evidence.mime_type,
            bytes,
        })
    }

    /// Decrypt and verify into memory. Used by bulk flows; not audited.
    pub fn get_decrypted_content(&self, evidence: &Evidence) -> Result<Vec<u8>> {
        let stored = self.fetch_stored(evidence)?;
        self.open_content(evidence, stored)
    }

    /// Copy version `target_version` forward as a brand-new latest version.
    ///
    /// The stored bytes, checksum and key material are carried over; the
    /// new version gets its own uuid and path. Older versions are untouched.
    pub fn revert_to_version(
        &self,
        evidence: &Evidence,
        target_version: u32,
        ctx: &ActorContext,
    ) -> Result<Evidence> {
        let current = self.find(ctx.tenant_id, evidence.id)?;
        let target = self
            .get_versions(&current)?
            .into_iter()
            .find(|v| v.version == target_version)
            .ok_or_else(|| {
                VaultError::NotFound(format!(
                    "version {} of {}",
                    target_version, current.filename
                ))
            })?;

        let stored = self.fetch_stored(&target)?;
        // Never copy forward content that no longer verifies.
        self.open_content(&target, stored.clone())?;

        let new = NewVersion {
            tenant_id: target.tenant_id,
            audit_id: target.audit_id,
            filename: &target.filename,
            mime_type: &target.mime_type,
            size_bytes: target.size_bytes,
            checksum: &target.checksum,
            envelope: &target.envelope,
            stored: &stored,
            category: target.category.as_deref(),
            tags: &target.tags,
            uploader_id: ctx.user_id,
        };
        let reverted = self.persist(&new, ctx, |ev| {
            AuditEvent::new(actions::REVERTED, "evidence", Some(ev.id))
                .with("filename", ev.filename.as_str())
                .with("from_version", target.version)
                .with("source_evidence_id", target.id)
                .with("version", ev.version)
        })?;
        info!(
            tenant = %reverted.tenant_id,
            evidence_id = reverted.id,
            from_version = target.version,
            version = reverted.version,
            "evidence reverted"
        );
        Ok(reverted)
    }

    /// Mark one version deleted. Returns `false` if it was already deleted
    /// or does not belong to the actor's tenant.
    pub fn delete(&self, evidence: &Evidence, ctx: &ActorContext) -> Result<bool> {
        let deleted = self.db.write(|tx| {
            let changed = tx.execute(
                "UPDATE evidences SET deleted_at = ?1
                 WHERE id = ?2 AND tenant_id = ?3 AND deleted_at IS NULL",
                params![format_timestamp(&now()), evidence.id, ctx.tenant_id.0],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            self.audit.record_in(
                tx,
                AuditEvent::new(actions::DELETED, "evidence", Some(evidence.id))
                    .with("filename", evidence.filename.as_str())
                    .with("version", evidence.version),
                ctx,
            )?;
            Ok(true)
        })?;
        if deleted {
            info!(tenant = %ctx.tenant_id, evidence_id = evidence.id, "evidence soft-deleted");
        }
        Ok(deleted)
    }

    /// Remove the stored object and the row. Irreversible.
    ///
    /// The object is removed before the transaction commits; if removal
    /// fails the row stays.
    pub fn force_delete(&self, evidence: &Evidence, ctx: &ActorContext) -> Result<bool> {
        let purged = self.db.write(|tx| {
            let Some(row) = find_in(tx, ctx.tenant_id, evidence.id)? else {
                return Ok(false);
            };
            self.ensure_in_tenant(&row.stored_path, row.tenant_id)?;
            tx.execute(
                "DELETE FROM evidences WHERE id = ?1 AND tenant_id = ?2",
                params![row.id, row.tenant_id.0],
            )?;
            self.audit.record_in(
                tx,
                AuditEvent::new(actions::PURGED, "evidence", Some(row.id))
                    .with("filename", row.filename.as_str())
                    .with("version", row.version)
                    .with("checksum", row.checksum.as_str()),
                ctx,
            )?;
            if !self.objects.delete(&row.stored_path)? {
                warn!(evidence_id = row.id, path = %row.stored_path, "purged evidence had no stored object");
            }
            Ok(true)
        })?;
        if purged {
            info!(tenant = %ctx.tenant_id, evidence_id = evidence.id, "evidence purged");
        }
        Ok(purged)
    }

    /// Check one version end to end without raising.
    pub fn verify_integrity(&self, evidence: &Evidence) -> IntegrityReport {
        let stored = match self.fetch_stored(evidence) {
            Ok(stored) => stored,
            Err(VaultError::NotFound(_)) => return IntegrityReport::MissingObject,
            Err(e) => {
                return IntegrityReport::Unreadable {
                    reason: e.to_string(),
                }
            }
        };
        match self.open_content(evidence, stored) {
            Ok(_) => IntegrityReport::Ok,
            Err(VaultError::Integrity(e)) => IntegrityReport::Corrupted {
                expected: e.expected,
                actual: e.actual,
            },
            Err(VaultError::Crypto(e)) => IntegrityReport::Undecryptable {
                reason: e.to_string(),
            },
            Err(e) => IntegrityReport::Unreadable {
                reason: e.to_string(),
            },
        }
    }

    fn ensure_in_tenant(&self, path: &ObjectPath, tenant: TenantId) -> Result<()> {
        ensure_scoped(path, &evidence_prefix(tenant)).map_err(|_| VaultError::PathOutsideTenant {
            path: path.to_string(),
            tenant: tenant.to_string(),
        })
    }

    fn fetch_stored(&self, evidence: &Evidence) -> Result<Vec<u8>> {
        self.ensure_in_tenant(&evidence.stored_path, evidence.tenant_id)?;
        self.objects
            .get(&evidence.stored_path)?
            .ok_or_else(|| VaultError::NotFound(format!("stored object for evidence {}", evidence.id)))
    }

    /// Decrypt (when encrypted) and check the plaintext checksum.
    fn open_content(&self, evidence: &Evidence, stored: Vec<u8>) -> Result<Vec<u8>> {
        let plaintext = match evidence.envelope.content(stored) {
            EvidenceContent::Plaintext(bytes) => bytes,
            EvidenceContent::Encrypted(payload) => {
                self.envelope.decrypt_payload(&payload).map_err(|e| {
                    error!(evidence_id = evidence.id, error = %e, "evidence decryption failed");
                    VaultError::Crypto(e)
                })?
            }
        };
        ensure_checksum(&plaintext, &evidence.checksum).map_err(|e| {
            error!(evidence_id = evidence.id, error = %e, "evidence failed checksum verification");
            VaultError::Integrity(e)
        })?;
        Ok(plaintext)
    }

    /// Claim the next version and write object, row and audit entry.
    ///
    /// Retries a bounded number of times on a version collision.
    fn persist(
        &self,
        new: &NewVersion<'_>,
        ctx: &ActorContext,
        event: impl Fn(&Evidence) -> AuditEvent,
    ) -> Result<Evidence> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut written: Option<ObjectPath> = None;
            let result = self.db.write(|tx| {
                let evidence = self.claim_version(tx, new, &mut written)?;
                self.audit.record_in(tx, event(&evidence), ctx)?;
                Ok(evidence)
            });
            match result {
                Ok(evidence) => return Ok(evidence),
                Err(err) => {
                    if let Some(path) = written {
                        self.discard_object(&path);
                    }
                    if is_unique_violation(&err) && attempt < MAX_WRITE_ATTEMPTS {
                        warn!(attempt, filename = new.filename, "version collision, retrying");
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    fn claim_version(
        &self,
        tx: &Connection,
        new: &NewVersion<'_>,
        written: &mut Option<ObjectPath>,
    ) -> Result<Evidence> {
        let max: Option<u32> = tx.query_row(
            "SELECT MAX(version) FROM evidences
             WHERE tenant_id = ?1 AND audit_id = ?2 AND filename = ?3",
            params![new.tenant_id.0, new.audit_id, new.filename],
            |row| row.get(0),
        )?;
        let version = max
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| VaultError::InvalidInput("version number overflow".into()))?;
        let uuid = Uuid::new_v4().to_string();
        let path = evidence_path(new.tenant_id, &uuid, version)?;

        // A failed write leaves nothing behind: the transaction rolls back.
        self.objects.put(&path, new.stored)?;
        *written = Some(path.clone());

        let (wrapped_key, iv) = match new.envelope {
            Envelope::Encrypted { wrapped_key, iv } => (Some(wrapped_key.as_slice()), Some(iv.as_slice())),
            Envelope::Plaintext => (None, None),
        };
        let created_at = now();
        tx.execute(
            "INSERT INTO evidences (uuid, tenant_id, audit_id, filename, mime_type, size_bytes,
                 stored_path, checksum, version, wrapped_key, iv, category, tags, uploader_id,
                 created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                uuid,
                new.tenant_id.0,
                new.audit_id,
                new.filename,
                new.mime_type,
                new.size_bytes,
                path.as_str(),
                new.checksum,
                version,
                wrapped_key,
                iv,
                new.category,
                serde_json::to_string(new.tags)?,
                new.uploader_id,
                format_timestamp(&created_at),
            ],
        )?;

        Ok(Evidence {
            id: tx.last_insert_rowid(),
            uuid,
            tenant_id: new.tenant_id,
            audit_id: new.audit_id,
            filename: new.filename.to_string(),
            mime_type: new.mime_type.to_string(),
            size_bytes: new.size_bytes,
            stored_path: path,
            checksum: new.checksum.to_string(),
            version,
            envelope: new.envelope.clone(),
            category: new.category.map(str::to_string),
            tags: new.tags.to_vec(),
            uploader_id: new.uploader_id,
            created_at,
            deleted_at: None,
        })
    }

    fn discard_object(&self, path: &ObjectPath) {
        match self.objects.delete(path) {
            Ok(_) => {}
            Err(e) => warn!(path = %path, error = %e, "failed to clean up orphaned object"),
        }
    }
}

impl std::fmt::Debug for EvidenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceStore")
            .field("provider", &self.objects.capabilities().provider)
            .finish_non_exhaustive()
    }
}
