//! Table definitions and the idempotent migration run on open.

use rusqlite::Connection;

/// Bumped whenever the DDL below changes shape.
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS evidences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    tenant_id INTEGER NOT NULL,
    audit_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    stored_path TEXT NOT NULL,
    checksum TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    wrapped_key BLOB,
    iv BLOB,
    category TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    uploader_id INTEGER,
    created_at TEXT NOT NULL,
    deleted_at TEXT,
    UNIQUE (tenant_id, audit_id, filename, version),
    CHECK ((wrapped_key IS NULL) = (iv IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_evidences_group
    ON evidences(tenant_id, audit_id, filename, version);

-- Versions are immutable; only the soft-delete marker may change.
CREATE TRIGGER IF NOT EXISTS evidences_immutable
BEFORE UPDATE OF uuid, tenant_id, audit_id, filename, mime_type, size_bytes,
    stored_path, checksum, version, wrapped_key, iv, category, tags,
    uploader_id, created_at
ON evidences
BEGIN
    SELECT RAISE(ABORT, 'evidence versions are immutable');
END;

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    user_id INTEGER,
    action TEXT NOT NULL,
    model_type TEXT NOT NULL,
    model_id INTEGER,
    payload TEXT NOT NULL,
    ip_address TEXT,
    user_agent TEXT,
    created_at TEXT NOT NULL,
    signature TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_logs_tenant_created
    ON audit_logs(tenant_id, created_at DESC, id DESC);

CREATE TRIGGER IF NOT EXISTS audit_logs_no_update
BEFORE UPDATE ON audit_logs
BEGIN
    SELECT RAISE(ABORT, 'audit_logs is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_logs_no_delete
BEFORE DELETE ON audit_logs
BEGIN
    SELECT RAISE(ABORT, 'audit_logs is append-only');
END;
"#;

/// Create tables, indexes and triggers if missing, then stamp the version.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let current: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }
    conn.execute_batch(SCHEMA_V1)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
