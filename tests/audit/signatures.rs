//! Integration tests for audit signing, tamper detection, queries and exports.

#[path = "../common/mod.rs"]
mod common;

use std::thread::sleep;
use std::time::Duration;

use attest::attest_crypto::{AppSecret, Signer};
use attest::audit::{actions, verify_entry};
use attest::types::format_timestamp;
use attest::{
    ActorContext, AuditEvent, AuditFilter, AuditLogEntry, Page, PayloadValue, TenantId, Vault,
};
use rusqlite::Connection;

use common::{alice, config, init_tracing, memory_vault, tenant, SECRET_HEX};

fn file_vault(dir: &tempfile::TempDir) -> Vault {
    init_tracing();
    let mut cfg = config();
    cfg.database.path = Some(dir.path().join("attest.db"));
    Vault::open(&cfg).expect("open file vault")
}

fn uploaded(filename: &str) -> AuditEvent {
    AuditEvent::new(actions::UPLOADED, "evidence", Some(1)).with("filename", filename)
}

// ============================================================================
// Tamper detection
// ============================================================================

#[test]
fn payload_changed_in_storage_fails_verification() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = file_vault(&dir);
    let entry = vault.audit().record(uploaded("x"), &alice()).expect("record");
    assert!(vault.audit().verify_signature(&entry));

    // Someone with direct database access removes the guard and edits the row.
    let raw = Connection::open(dir.path().join("attest.db")).expect("raw connection");
    raw.busy_timeout(Duration::from_secs(5)).expect("busy timeout");
    raw.execute_batch("DROP TRIGGER audit_logs_no_update;")
        .expect("drop trigger");
    raw.execute(
        "UPDATE audit_logs SET payload = ?1 WHERE id = ?2",
        rusqlite::params![r#"{"filename":"y"}"#, entry.id],
    )
    .expect("tamper");

    let page = vault
        .audit()
        .verify_page(tenant(), &AuditFilter::default(), Page::default())
        .expect("verify page");
    assert_eq!(page.items.len(), 1);
    assert_eq!(
        page.items[0].entry.payload["filename"],
        PayloadValue::Text("y".into())
    );
    assert!(!page.items[0].verified);
}

#[test]
fn timestamp_rewritten_in_storage_fails_verification() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = file_vault(&dir);
    let entry = vault.audit().record(uploaded("x"), &alice()).expect("record");

    // Same instant, different text.
    let equivalent = entry.created_at.as_str().replace('Z', "+00:00");
    let raw = Connection::open(dir.path().join("attest.db")).expect("raw connection");
    raw.busy_timeout(Duration::from_secs(5)).expect("busy timeout");
    raw.execute_batch("DROP TRIGGER audit_logs_no_update;")
        .expect("drop trigger");
    raw.execute(
        "UPDATE audit_logs SET created_at = ?1 WHERE id = ?2",
        rusqlite::params![equivalent, entry.id],
    )
    .expect("rewrite timestamp");

    let page = vault
        .audit()
        .verify_page(tenant(), &AuditFilter::default(), Page::default())
        .expect("verify page");
    assert_eq!(page.items[0].entry.created_at.as_str(), equivalent);
    assert_eq!(
        page.items[0].entry.created_at.datetime(),
        entry.created_at.datetime()
    );
    assert!(!page.items[0].verified);
}

#[test]
fn append_only_is_enforced_by_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = file_vault(&dir);
    vault.audit().record(uploaded("x"), &alice()).expect("record");

    let raw = Connection::open(dir.path().join("attest.db")).expect("raw connection");
    raw.busy_timeout(Duration::from_secs(5)).expect("busy timeout");
    assert!(raw.execute("UPDATE audit_logs SET action = 'nothing'", []).is_err());
    assert!(raw.execute("DELETE FROM audit_logs", []).is_err());

    let page = vault
        .audit()
        .verify_page(tenant(), &AuditFilter::default(), Page::default())
        .expect("verify page");
    assert!(page.items.iter().all(|v| v.verified));
}

#[test]
fn mutated_copies_fail_and_original_passes() {
    let vault = memory_vault();
    let entry = vault.audit().record(uploaded("x"), &alice()).expect("record");

    let mut other_action = entry.clone();
    other_action.action = "cancelled".into();
    let mut other_ip = entry.clone();
    other_ip.ip_address = Some("198.51.100.1".into());
    let mut other_payload = entry.clone();
    other_payload
        .payload
        .insert("filename".into(), PayloadValue::Text("y".into()));
    let mut forged = entry.clone();
    forged.signature = "00".repeat(32);

    for tampered in [other_action, other_ip, other_payload, forged] {
        assert!(!vault.audit().verify_signature(&tampered));
    }
    assert!(vault.audit().verify_signature(&entry));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn filters_combine_and_stay_in_tenant() {
    let vault = memory_vault();
    let bob = ActorContext::user(tenant(), 200);
    vault.audit().record(uploaded("a"), &alice()).expect("a");
    vault
        .audit()
        .record(AuditEvent::new(actions::DOWNLOADED, "evidence", Some(1)), &bob)
        .expect("b");
    vault
        .audit()
        .record(AuditEvent::new("cancelled", "audit", Some(7)), &alice())
        .expect("c");
    vault
        .audit()
        .record(uploaded("other tenant"), &ActorContext::user(TenantId(2), 100))
        .expect("d");

    let count = |filter: AuditFilter| {
        vault
            .audit()
            .query(tenant(), &filter, Page::default())
            .expect("query")
            .total
    };
    assert_eq!(count(AuditFilter::default()), 3);
    assert_eq!(
        count(AuditFilter {
            user_id: Some(100),
            ..Default::default()
        }),
        2
    );
    assert_eq!(count(AuditFilter::action(actions::DOWNLOADED)), 1);
    assert_eq!(count(AuditFilter::model("audit", 7)), 1);
    assert_eq!(
        count(AuditFilter {
            user_id: Some(100),
            model_type: Some("evidence".into()),
            ..Default::default()
        }),
        1
    );
}

#[test]
fn date_range_is_inclusive() {
    let vault = memory_vault();
    let mut entries = Vec::new();
    for name in ["a", "b", "c"] {
        entries.push(vault.audit().record(uploaded(name), &alice()).expect("record"));
        sleep(Duration::from_millis(2));
    }

    let filter = AuditFilter {
        date_from: Some(entries[1].created_at.datetime()),
        date_to: Some(entries[2].created_at.datetime()),
        ..Default::default()
    };
    let page = vault
        .audit()
        .query(tenant(), &filter, Page::default())
        .expect("query");
    let ids: Vec<i64> = page.items.iter().map(|e| e.id).collect();
    assert_eq!(ids, [entries[2].id, entries[1].id]);
}

#[test]
fn pagination_is_clamped_and_newest_first() {
    let vault = memory_vault();
    for i in 0..23 {
        vault
            .audit()
            .record(
                AuditEvent::new(actions::UPLOADED, "evidence", Some(i)),
                &alice(),
            )
            .expect("record");
    }

    let page = vault
        .audit()
        .query(tenant(), &AuditFilter::default(), vault.audit().page(3, Some(10)))
        .expect("page 3");
    assert_eq!(page.total, 23);
    assert_eq!(page.last_page, 3);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.items.last().map(|e| e.model_id), Some(Some(0)));

    let first = vault
        .audit()
        .query(tenant(), &AuditFilter::default(), Page { page: 1, per_page: 5000 })
        .expect("oversized page");
    assert_eq!(first.per_page, 100);
    assert_eq!(first.items[0].model_id, Some(22));

    let beyond = vault
        .audit()
        .query(tenant(), &AuditFilter::default(), vault.audit().page(9, None))
        .expect("past the end");
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 23);
}

// ============================================================================
// Exports
// ============================================================================

#[test]
fn json_export_verifies_offline() {
    let vault = memory_vault();
    vault.audit().record(uploaded("x"), &alice()).expect("one");
    vault
        .audit()
        .record(
            AuditEvent::new("cancelled", "audit", None).with("reason", "scope change"),
            &ActorContext::system(tenant()),
        )
        .expect("two");

    let exported = vault
        .audit()
        .export_json(tenant(), &AuditFilter::default())
        .expect("export");
    let parsed: Vec<AuditLogEntry> = serde_json::from_str(&exported).expect("parse export");
    assert_eq!(parsed.len(), 2);
    for entry in &parsed {
        let stamp = format_timestamp(&entry.created_at.datetime());
        assert_eq!(entry.created_at.as_str(), stamp);
        assert!(exported.contains(&format!("\"created_at\": \"{}\"", stamp)));
    }

    // Only the secret is needed to check an export.
    let secret = AppSecret::parse(SECRET_HEX).expect("secret");
    let signer = Signer::from_app_secret(&secret).expect("signer");
    assert!(parsed.iter().all(|entry| verify_entry(&signer, entry)));

    let mut edited = parsed[0].clone();
    edited.user_agent = Some("edited".into());
    assert!(!verify_entry(&signer, &edited));
}

#[test]
fn csv_export_has_every_field() {
    let vault = memory_vault();
    let entry = vault
        .audit()
        .record(uploaded("quarterly, final.pdf"), &alice())
        .expect("record");

    let csv = vault
        .audit()
        .export_csv(tenant(), &AuditFilter::default())
        .expect("export");
    let mut lines = csv.split("\r\n");
    assert_eq!(
        lines.next(),
        Some("id,tenant_id,user_id,action,model_type,model_id,payload,ip_address,user_agent,created_at,signature")
    );
    let row = lines.next().expect("row");
    assert!(row.starts_with(&format!("{},1,100,uploaded,evidence,1,", entry.id)));
    assert!(row.contains(r#""{""filename"":""quarterly, final.pdf""}""#));
    assert!(row.ends_with(&entry.signature));
    assert_eq!(lines.next(), Some(""));
}
