//! Integration tests for archive assembly, outer encryption and retrieval.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::sync::Arc;

use attest::archive::read_manifest;
use attest::attest_crypto::decode_transport;
use attest::attest_store::{MemoryStore, ObjectPath, ObjectStore};
use attest::audit::actions;
use attest::db::Database;
use attest::{
    ArchiveRequest, AuditFilter, Evidence, Page, TenantId, UploadRequest, Vault, VaultError,
};

use common::{alice, config, init_tracing, tenant};

fn vault_with_store() -> (Vault, Arc<MemoryStore>) {
    init_tracing();
    let objects = Arc::new(MemoryStore::new());
    let db = Arc::new(Database::open_in_memory().expect("db"));
    let vault = Vault::with_components(&config(), db, objects.clone()).expect("vault");
    (vault, objects)
}

fn upload(vault: &Vault, filename: &str, category: Option<&str>, body: &str) -> Evidence {
    let mut req = UploadRequest::new(7, filename, "application/pdf", body);
    if let Some(category) = category {
        req = req.with_category(category);
    }
    vault.evidence().upload(req, &alice()).expect("upload")
}

fn zip_entry(zip_bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).expect("zip");
    let mut file = archive.by_name(name).expect("entry");
    let mut out = Vec::new();
    file.read_to_end(&mut out).expect("read entry");
    out
}

// ============================================================================
// Layout and encryption
// ============================================================================

#[test]
fn archive_groups_members_and_is_encrypted_at_rest() {
    let (vault, objects) = vault_with_store();
    let policy = upload(&vault, "policy.pdf", Some("Access Control"), "policy body");
    let loose = upload(&vault, "notes.pdf", None, "notes body");

    let outcome = vault
        .archives()
        .build_archive(
            ArchiveRequest {
                audit_id: 7,
                members: vec![policy.clone(), loose.clone()],
                documents: vec![("summary.pdf".into(), b"summary".to_vec())],
            },
            &alice(),
        )
        .expect("build");
    assert_eq!(outcome.included, 2);
    assert!(outcome.skipped.is_empty());
    assert!(outcome.stored_path.as_str().starts_with("exports/1/audit_7_"));
    assert!(outcome.stored_path.as_str().ends_with(".zip"));

    // Stored form is the three-part transport encoding, not a zip.
    let stored = objects
        .get(&outcome.stored_path)
        .expect("get")
        .expect("archive stored");
    assert!(!stored.starts_with(b"PK"));
    let text = String::from_utf8(stored).expect("utf8");
    assert_eq!(text.split(':').count(), 3);
    assert!(decode_transport(&text).is_ok());

    let zip_bytes = vault
        .archives()
        .open_archive(tenant(), &outcome.stored_path)
        .expect("open");
    assert_eq!(zip_bytes.len() as u64, outcome.size_bytes);
    assert_eq!(
        zip_entry(&zip_bytes, "evidence/Access_Control/policy.pdf"),
        b"policy body"
    );
    assert_eq!(zip_entry(&zip_bytes, "evidence/unlinked/notes.pdf"), b"notes body");
    assert_eq!(zip_entry(&zip_bytes, "documents/summary.pdf"), b"summary");

    let manifest = read_manifest(&zip_bytes).expect("manifest");
    assert_eq!(manifest.tenant_id, tenant());
    assert_eq!(manifest.audit_id, 7);
    assert_eq!(manifest.included.len(), 2);
    assert_eq!(manifest.included[0].checksum, policy.checksum);
    assert_eq!(manifest.documents, ["documents/summary.pdf"]);
}

#[test]
fn same_filename_versions_do_not_collide() {
    let (vault, _) = vault_with_store();
    let v1 = upload(&vault, "report.pdf", None, "one");
    let v2 = upload(&vault, "report.pdf", None, "two");

    let outcome = vault
        .archives()
        .build_archive(
            ArchiveRequest {
                audit_id: 7,
                members: vec![v1, v2],
                documents: Vec::new(),
            },
            &alice(),
        )
        .expect("build");
    let zip_bytes = vault
        .archives()
        .open_archive(tenant(), &outcome.stored_path)
        .expect("open");
    assert_eq!(zip_entry(&zip_bytes, "evidence/unlinked/report.pdf"), b"one");
    assert_eq!(zip_entry(&zip_bytes, "evidence/unlinked/v2-report.pdf"), b"two");
}

#[test]
fn repeated_member_gets_distinct_entries() {
    let (vault, _) = vault_with_store();
    let ev = upload(&vault, "a.pdf", None, "a");

    let outcome = vault
        .archives()
        .build_archive(
            ArchiveRequest {
                audit_id: 7,
                members: vec![ev.clone(); 4],
                documents: Vec::new(),
            },
            &alice(),
        )
        .expect("build");
    assert_eq!(outcome.included, 4);

    let zip_bytes = vault
        .archives()
        .open_archive(tenant(), &outcome.stored_path)
        .expect("open");
    let archive = zip::ZipArchive::new(Cursor::new(&zip_bytes[..])).expect("zip");
    let names: BTreeSet<&str> = archive.file_names().collect();
    assert_eq!(names.len(), archive.len());
    assert_eq!(archive.len(), 5);
    let last = format!("evidence/unlinked/{}-v1-2-a.pdf", ev.id);
    assert_eq!(zip_entry(&zip_bytes, &last), b"a");
}

// ============================================================================
// Partial failure
// ============================================================================

#[test]
fn unreadable_members_are_skipped_and_listed() {
    let (vault, objects) = vault_with_store();
    let good = upload(&vault, "good.pdf", Some("hr"), "good");
    let corrupt = upload(&vault, "corrupt.pdf", Some("hr"), "corrupt");
    let missing = upload(&vault, "missing.pdf", None, "missing");
    let deleted = upload(&vault, "deleted.pdf", None, "deleted");

    let mut bytes = objects
        .get(&corrupt.stored_path)
        .expect("get")
        .expect("present");
    bytes[0] ^= 0x01;
    objects.put(&corrupt.stored_path, &bytes).expect("put");
    objects.delete(&missing.stored_path).expect("delete");
    vault.evidence().delete(&deleted, &alice()).expect("soft delete");
    let deleted = vault.evidence().find(tenant(), deleted.id).expect("reload");

    let outcome = vault
        .archives()
        .build_archive(
            ArchiveRequest {
                audit_id: 7,
                members: vec![good.clone(), corrupt.clone(), missing.clone(), deleted.clone()],
                documents: Vec::new(),
            },
            &alice(),
        )
        .expect("partial archive still builds");
    assert_eq!(outcome.included, 1);
    let skipped: Vec<(i64, &str)> = outcome
        .skipped
        .iter()
        .map(|s| (s.evidence_id, s.reason.as_str()))
        .collect();
    assert_eq!(
        skipped,
        [
            (corrupt.id, "decryption failed"),
            (missing.id, "stored object missing"),
            (deleted.id, "deleted"),
        ]
    );

    let zip_bytes = vault
        .archives()
        .open_archive(tenant(), &outcome.stored_path)
        .expect("open");
    let manifest = read_manifest(&zip_bytes).expect("manifest");
    assert_eq!(manifest.included[0].evidence_id, good.id);
    assert_eq!(manifest.skipped, outcome.skipped);
}

#[test]
fn foreign_tenant_members_are_skipped() {
    let (vault, _) = vault_with_store();
    let other = vault
        .evidence()
        .upload(
            UploadRequest::new(7, "theirs.pdf", "application/pdf", "theirs"),
            &attest::ActorContext::user(TenantId(2), 5),
        )
        .expect("other tenant upload");

    let outcome = vault
        .archives()
        .build_archive(
            ArchiveRequest {
                audit_id: 7,
                members: vec![other],
                documents: Vec::new(),
            },
            &alice(),
        )
        .expect("build");
    assert_eq!(outcome.included, 0);
    assert_eq!(outcome.skipped[0].reason, "outside tenant");
}

// ============================================================================
// Retrieval and audit
// ============================================================================

#[test]
fn archives_are_tenant_scoped() {
    let (vault, _) = vault_with_store();
    let ev = upload(&vault, "a.pdf", None, "a");
    let outcome = vault
        .archives()
        .build_archive(
            ArchiveRequest {
                audit_id: 7,
                members: vec![ev],
                documents: Vec::new(),
            },
            &alice(),
        )
        .expect("build");

    let err = vault
        .archives()
        .open_archive(TenantId(2), &outcome.stored_path)
        .unwrap_err();
    assert!(matches!(err, VaultError::PathOutsideTenant { .. }));

    let evidence_path = ObjectPath::parse("tenants/1/evidences/x_v1").expect("path");
    assert!(matches!(
        vault.archives().open_archive(tenant(), &evidence_path),
        Err(VaultError::PathOutsideTenant { .. })
    ));

    let absent = ObjectPath::parse("exports/1/audit_7_0.zip").expect("path");
    assert!(matches!(
        vault.archives().open_archive(tenant(), &absent),
        Err(VaultError::NotFound(_))
    ));
}

#[test]
fn build_is_audited() {
    let (vault, _) = vault_with_store();
    let ev = upload(&vault, "a.pdf", None, "a");
    let outcome = vault
        .archives()
        .build_archive(
            ArchiveRequest {
                audit_id: 7,
                members: vec![ev],
                documents: Vec::new(),
            },
            &alice(),
        )
        .expect("build");

    let page = vault
        .audit()
        .query(tenant(), &AuditFilter::action(actions::EXPORTED), Page::default())
        .expect("query");
    assert_eq!(page.total, 1);
    let entry = &page.items[0];
    assert_eq!(entry.model_type, "audit");
    assert_eq!(entry.model_id, Some(7));
    assert_eq!(
        entry.payload["path"],
        attest::PayloadValue::Text(outcome.stored_path.to_string())
    );
    assert!(vault.audit().verify_signature(entry));
}
