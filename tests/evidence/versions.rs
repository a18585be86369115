//! Integration tests for evidence versioning, retrieval and atomicity.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use attest::attest_crypto::checksum;
use attest::attest_store::{MemoryStore, ObjectStore, StorageProvider};
use attest::audit::actions;
use attest::db::Database;
use attest::{
    ActorContext, AuditFilter, IntegrityReport, Page, TenantId, UploadRequest, Vault, VaultConfig,
    VaultError,
};

use common::{alice, config, init_tracing, memory_vault, tenant, FlakyStore};

fn report(bytes: &str) -> UploadRequest {
    UploadRequest::new(1, "report.pdf", "application/pdf", bytes)
}

// ============================================================================
// Versioning
// ============================================================================

#[test]
fn report_upload_then_revert_copies_forward() {
    let vault = memory_vault();
    let store = vault.evidence();

    let v1 = store.upload(report("A"), &alice()).expect("upload A");
    assert_eq!(v1.version, 1);
    assert_eq!(v1.checksum, checksum(b"A"));

    let v2 = store.upload(report("B"), &alice()).expect("upload B");
    assert_eq!(v2.version, 2);
    assert_eq!(v2.checksum, checksum(b"B"));

    let v3 = store.revert_to_version(&v2, 1, &alice()).expect("revert");
    assert_eq!(v3.version, 3);
    assert_eq!(v3.checksum, v1.checksum);
    assert_ne!(v3.uuid, v1.uuid);
    assert_ne!(v3.stored_path, v1.stored_path);
    assert_eq!(store.get_decrypted_content(&v3).expect("read v3"), b"A");

    // Version 1 is untouched and still independently retrievable.
    assert_eq!(store.find(tenant(), v1.id).expect("find v1"), v1);
    assert_eq!(
        store.download(&v1, &alice()).expect("download v1").bytes,
        b"A"
    );

    let versions: Vec<u32> = store
        .get_versions(&v1)
        .expect("versions")
        .iter()
        .map(|e| e.version)
        .collect();
    assert_eq!(versions, [1, 2, 3]);
}

#[test]
fn revert_to_missing_version_is_not_found() {
    let vault = memory_vault();
    let v1 = vault.evidence().upload(report("A"), &alice()).expect("upload");
    let err = vault
        .evidence()
        .revert_to_version(&v1, 9, &alice())
        .unwrap_err();
    assert!(matches!(err, VaultError::NotFound(_)));
    assert_eq!(err.status_code(), 404);
}

#[test]
fn sequential_uploads_have_no_gaps() {
    let vault = memory_vault();
    for n in 1..=6u32 {
        let ev = vault
            .evidence()
            .upload(report(&n.to_string()), &alice())
            .expect("upload");
        assert_eq!(ev.version, n);
    }
    // A different filename and a different audit start their own sequences.
    let other = vault
        .evidence()
        .upload(UploadRequest::new(1, "other.pdf", "application/pdf", "x"), &alice())
        .expect("upload other");
    assert_eq!(other.version, 1);
    let other_audit = vault
        .evidence()
        .upload(UploadRequest::new(2, "report.pdf", "application/pdf", "x"), &alice())
        .expect("upload other audit");
    assert_eq!(other_audit.version, 1);
}

#[test]
fn concurrent_uploads_from_two_instances_get_distinct_versions() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.database.path = Some(dir.path().join("attest.db"));
    cfg.database.busy_timeout_ms = 30_000;
    cfg.storage = StorageProvider::Local {
        root: dir.path().join("objects"),
    };

    let first = Vault::open(&cfg).expect("open first");
    let second = Vault::open(&cfg).expect("open second");

    const THREADS_PER_VAULT: usize = 4;
    const UPLOADS_PER_THREAD: usize = 5;

    let mut handles = Vec::new();
    for vault in [first.clone(), second.clone()] {
        for t in 0..THREADS_PER_VAULT {
            let vault = vault.clone();
            handles.push(thread::spawn(move || {
                (0..UPLOADS_PER_THREAD)
                    .map(|i| {
                        vault
                            .evidence()
                            .upload(report(&format!("{}-{}", t, i)), &alice())
                            .expect("concurrent upload")
                            .version
                    })
                    .collect::<Vec<_>>()
            }));
        }
    }

    let mut seen = Vec::new();
    for handle in handles {
        seen.extend(handle.join().expect("upload thread"));
    }
    let total = 2 * THREADS_PER_VAULT * UPLOADS_PER_THREAD;
    let distinct: BTreeSet<u32> = seen.iter().copied().collect();
    assert_eq!(seen.len(), total);
    assert_eq!(distinct, (1..=total as u32).collect::<BTreeSet<_>>());

    // Both instances agree on the stored history.
    let latest = first.evidence().list_latest(tenant(), 1).expect("latest");
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].version, total as u32);
    let versions = second.evidence().get_versions(&latest[0]).expect("versions");
    assert_eq!(versions.len(), total);
}

// ============================================================================
// Atomicity
// ============================================================================

#[test]
fn storage_failure_leaves_no_row_and_no_audit_entry() {
    init_tracing();
    let objects = FlakyStore::new();
    let db = Arc::new(Database::open_in_memory().expect("db"));
    let vault = Vault::with_components(&config(), db, objects.clone()).expect("vault");

    objects.fail_puts(true);
    let err = vault
        .evidence()
        .upload(report("A"), &alice())
        .unwrap_err();
    assert!(matches!(err, VaultError::Storage(_)));
    assert_eq!(err.status_code(), 503);
    assert!(vault.evidence().list_latest(tenant(), 1).expect("list").is_empty());
    assert_eq!(objects.object_count(), 0);
    let log = vault
        .audit()
        .query(tenant(), &AuditFilter::default(), Page::default())
        .expect("audit query");
    assert_eq!(log.total, 0);

    objects.fail_puts(false);
    let ev = vault.evidence().upload(report("A"), &alice()).expect("retry");
    assert_eq!(ev.version, 1);
    assert_eq!(objects.object_count(), 1);
}

#[test]
fn upload_is_audited_with_request_metadata() {
    let vault = memory_vault();
    let ev = vault.evidence().upload(report("A"), &alice()).expect("upload");
    let page = vault
        .audit()
        .query(tenant(), &AuditFilter::model("evidence", ev.id), Page::default())
        .expect("query");
    assert_eq!(page.total, 1);
    let entry = &page.items[0];
    assert_eq!(entry.action, actions::UPLOADED);
    assert_eq!(entry.user_id, Some(100));
    assert_eq!(entry.ip_address.as_deref(), Some("192.0.2.10"));
    assert_eq!(entry.user_agent.as_deref(), Some("integration-tests"));
    assert!(vault.audit().verify_signature(entry));
}

// ============================================================================
// Retrieval and tenancy
// ============================================================================

#[test]
fn other_tenant_cannot_download() {
    let vault = memory_vault();
    let ev = vault.evidence().upload(report("A"), &alice()).expect("upload");
    let mallory = ActorContext::user(TenantId(2), 200);
    let err = vault.evidence().download(&ev, &mallory).unwrap_err();
    assert!(matches!(err, VaultError::NotFound(_)));
    assert!(vault.evidence().list_latest(TenantId(2), 1).expect("list").is_empty());
}

#[test]
fn corrupted_download_is_generic_server_error() {
    init_tracing();
    let objects = Arc::new(MemoryStore::new());
    let db = Arc::new(Database::open_in_memory().expect("db"));
    let vault = Vault::with_components(&config(), db, objects.clone()).expect("vault");
    let ev = vault.evidence().upload(report("A"), &alice()).expect("upload");

    let mut stored = objects.get(&ev.stored_path).expect("get").expect("present");
    let last = stored.len() - 1;
    stored[last] ^= 0xff;
    objects.put(&ev.stored_path, &stored).expect("put");

    let err = vault.evidence().download(&ev, &alice()).unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert_eq!(err.user_message(), attest::error::RETRIEVAL_FAILED_MESSAGE);
    assert!(!vault.evidence().verify_integrity(&ev).is_ok());

    // A failed download is not recorded as a download.
    let downloads = vault
        .audit()
        .query(tenant(), &AuditFilter::action(actions::DOWNLOADED), Page::default())
        .expect("query");
    assert_eq!(downloads.total, 0);
}

#[test]
fn wrong_secret_cannot_decrypt() {
    init_tracing();
    let objects = Arc::new(MemoryStore::new());
    let db = Arc::new(Database::open_in_memory().expect("db"));
    let writer =
        Vault::with_components(&config(), db.clone(), objects.clone()).expect("writer");
    let ev = writer.evidence().upload(report("A"), &alice()).expect("upload");

    let other = VaultConfig::new("ff".repeat(32));
    let reader = Vault::with_components(&other, db, objects).expect("reader");
    let err = reader.evidence().download(&ev, &alice()).unwrap_err();
    assert!(matches!(err, VaultError::Crypto(_)));
    assert!(matches!(
        reader.evidence().verify_integrity(&ev),
        IntegrityReport::Undecryptable { .. }
    ));
}

#[test]
fn legacy_rows_are_served_after_verification() {
    let vault = memory_vault();
    let legacy = vault
        .evidence()
        .import_legacy(report("old bytes"), &alice())
        .expect("import");
    assert!(!legacy.envelope.is_encrypted());
    let upgraded = vault.evidence().upload(report("new bytes"), &alice()).expect("upload");
    assert_eq!(upgraded.version, 2);
    assert!(upgraded.envelope.is_encrypted());

    assert_eq!(
        vault.evidence().download(&legacy, &alice()).expect("download").bytes,
        b"old bytes"
    );
    assert_eq!(vault.evidence().verify_integrity(&legacy), IntegrityReport::Ok);
}

#[test]
fn local_store_round_trip() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config();
    cfg.storage = StorageProvider::Local {
        root: dir.path().to_path_buf(),
    };
    let vault = Vault::open(&cfg).expect("open");
    let ev = vault.evidence().upload(report("on disk"), &alice()).expect("upload");

    let on_disk = dir.path().join(ev.stored_path.as_str());
    assert!(on_disk.is_file());
    assert_ne!(std::fs::read(&on_disk).expect("read"), b"on disk");
    assert_eq!(
        vault.evidence().download(&ev, &alice()).expect("download").bytes,
        b"on disk"
    );

    assert!(vault.evidence().force_delete(&ev, &alice()).expect("purge"));
    assert!(!on_disk.exists());
}
