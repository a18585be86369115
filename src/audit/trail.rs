//! Append-only, HMAC-signed audit log.

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::json;
use tracing::{debug, error};

use attest_crypto::{canonical_json, CryptoError, Signer};

use super::types::{AuditEvent, AuditFilter, AuditLogEntry, AuditPayload, VerifiedEntry};
use crate::config::AuditConfig;
use crate::db::{conversion_error, Database};
use crate::error::{Result, VaultError};
use crate::types::{format_timestamp, ActorContext, Page, Paginated, TenantId, Timestamp};

/// Domain separator for signed audit messages. Changing it, or the field set
/// below, invalidates every stored signature.
const SIGNATURE_CONTEXT: &[u8] = b"attest:audit:v1\0";

const ENTRY_COLUMNS: &str = "id, tenant_id, user_id, action, model_type, model_id, payload, \
                             ip_address, user_agent, created_at, signature";

/// The fields covered by a signature, borrowed from wherever they live.
struct SignedFields<'a> {
    tenant_id: TenantId,
    user_id: Option<i64>,
    action: &'a str,
    model_type: &'a str,
    model_id: Option<i64>,
    payload: &'a AuditPayload,
    ip_address: Option<&'a str>,
    user_agent: Option<&'a str>,
    created_at: &'a str,
}

impl<'a> SignedFields<'a> {
    fn of(entry: &'a AuditLogEntry) -> Self {
        Self {
            tenant_id: entry.tenant_id,
            user_id: entry.user_id,
            action: &entry.action,
            model_type: &entry.model_type,
            model_id: entry.model_id,
            payload: &entry.payload,
            ip_address: entry.ip_address.as_deref(),
            user_agent: entry.user_agent.as_deref(),
            created_at: entry.created_at.as_str(),
        }
    }

    /// `context || canonical_json(fields)`. Nulls are kept as explicit
    /// `null` members, the timestamp is the stored text as is.
    fn message(&self) -> std::result::Result<Vec<u8>, CryptoError> {
        let payload = serde_json::to_value(self.payload)
            .map_err(|e| CryptoError::SerializationError(e.to_string()))?;
        let value = json!({
            "tenant_id": self.tenant_id.0,
            "user_id": self.user_id,
            "action": self.action,
            "model_type": self.model_type,
            "model_id": self.model_id,
            "payload": payload,
            "ip_address": self.ip_address,
            "user_agent": self.user_agent,
            "created_at": self.created_at,
        });
        let canonical = canonical_json(&value)?;
        let mut message = Vec::with_capacity(SIGNATURE_CONTEXT.len() + canonical.len());
        message.extend_from_slice(SIGNATURE_CONTEXT);
        message.extend_from_slice(canonical.as_bytes());
        Ok(message)
    }
}

/// Recompute and compare an entry's signature with `signer`.
///
/// Usable offline on exported entries. Returns `false` on any mismatch.
pub fn verify_entry(signer: &Signer, entry: &AuditLogEntry) -> bool {
    match SignedFields::of(entry).message() {
        Ok(message) => signer.verify(&message, &entry.signature),
        Err(_) => false,
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditLogEntry> {
    let payload: String = row.get(6)?;
    let created_at: String = row.get(9)?;
    Ok(AuditLogEntry {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        user_id: row.get(2)?,
        action: row.get(3)?,
        model_type: row.get(4)?,
        model_id: row.get(5)?,
        payload: serde_json::from_str(&payload).map_err(|e| conversion_error(6, e))?,
        ip_address: row.get(7)?,
        user_agent: row.get(8)?,
        created_at: Timestamp::parse(created_at).map_err(|e| conversion_error(9, e))?,
        signature: row.get(10)?,
    })
}

/// Records and reads audit entries. There is no update or delete path.
pub struct AuditTrail {
    db: Arc<Database>,
    signer: Signer,
    config: AuditConfig,
}

impl AuditTrail {
    pub fn new(db: Arc<Database>, signer: Signer, config: AuditConfig) -> Self {
        Self { db, signer, config }
    }

    /// Sign and append one entry in its own transaction.
    pub fn record(&self, event: AuditEvent, ctx: &ActorContext) -> Result<AuditLogEntry> {
        self.db.write(|tx| self.record_in(tx, event, ctx))
    }

    /// Sign and append one entry on an open connection or transaction.
    ///
    /// Callers recording a privileged action pass the action's own
    /// transaction, so a signing failure rolls the action back.
    pub fn record_in(
        &self,
        conn: &Connection,
        event: AuditEvent,
        ctx: &ActorContext,
    ) -> Result<AuditLogEntry> {
        if event.action.trim().is_empty() || event.model_type.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "audit action and model type are required".into(),
            ));
        }
        let mut entry = AuditLogEntry {
            id: 0,
            tenant_id: ctx.tenant_id,
            user_id: ctx.user_id,
            action: event.action,
            model_type: event.model_type,
            model_id: event.model_id,
            payload: event.payload,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            created_at: Timestamp::now(),
            signature: String::new(),
        };
        entry.signature = self.sign(&entry)?;

        conn.execute(
            "INSERT INTO audit_logs (tenant_id, user_id, action, model_type, model_id, payload,
                 ip_address, user_agent, created_at, signature)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.tenant_id.0,
                entry.user_id,
                entry.action,
                entry.model_type,
                entry.model_id,
                serde_json::to_string(&entry.payload)?,
                entry.ip_address,
                entry.user_agent,
                entry.created_at.as_str(),
                entry.signature,
            ],
        )?;
        entry.id = conn.last_insert_rowid();
        debug!(
            tenant = %entry.tenant_id,
            action = %entry.action,
            model_type = %entry.model_type,
            model_id = ?entry.model_id,
            "audit entry recorded"
        );
        Ok(entry)
    }

    fn sign(&self, entry: &AuditLogEntry) -> Result<String> {
        SignedFields::of(entry)
            .message()
            .and_then(|message| self.signer.sign(&message))
            .map_err(|e| {
                error!(action = %entry.action, error = %e, "failed to sign audit entry");
                VaultError::Signature(e.to_string())
            })
    }

    /// Constant-time check of the stored signature. Mismatch is `false`.
    pub fn verify_signature(&self, entry: &AuditLogEntry) -> bool {
        verify_entry(&self.signer, entry)
    }

    /// Build a page request using the configured default and maximum size.
    pub fn page(&self, page: u32, per_page: Option<u32>) -> Page {
        Page::new(
            page,
            per_page.unwrap_or(self.config.default_per_page),
            self.config.max_per_page,
        )
    }

    /// Newest-first page of `tenant`'s entries matching `filter`.
    pub fn query(
        &self,
        tenant: TenantId,
        filter: &AuditFilter,
        page: Page,
    ) -> Result<Paginated<AuditLogEntry>> {
        let page = Page::new(page.page, page.per_page, self.config.max_per_page);
        let (where_sql, mut args) = where_clause(tenant, filter);
        self.db.read(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM audit_logs WHERE {}", where_sql),
                params_from_iter(args.iter()),
                |row| row.get(0),
            )?;

            args.push(SqlValue::Integer(i64::from(page.per_page)));
            args.push(SqlValue::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)));
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM audit_logs WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                ENTRY_COLUMNS, where_sql
            ))?;
            let items = stmt
                .query_map(params_from_iter(args.iter()), entry_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Paginated::new(items, u64::try_from(total).unwrap_or(0), page))
        })
    }

    /// Like [`query`](Self::query), pairing each entry with its verification result.
    pub fn verify_page(
        &self,
        tenant: TenantId,
        filter: &AuditFilter,
        page: Page,
    ) -> Result<Paginated<VerifiedEntry>> {
        Ok(self.query(tenant, filter, page)?.map(|entry| VerifiedEntry {
            verified: self.verify_signature(&entry),
            entry,
        }))
    }

    /// Every matching entry, newest first. Used by the exporters.
    pub fn entries(&self, tenant: TenantId, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>> {
        let (where_sql, args) = where_clause(tenant, filter);
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM audit_logs WHERE {} ORDER BY created_at DESC, id DESC",
                ENTRY_COLUMNS, where_sql
            ))?;
            let items = stmt
                .query_map(params_from_iter(args.iter()), entry_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(items)
        })
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn where_clause(tenant: TenantId, filter: &AuditFilter) -> (String, Vec<SqlValue>) {
    let mut clauses = vec!["tenant_id = ?"];
    let mut args = vec![SqlValue::Integer(tenant.0)];
    if let Some(user_id) = filter.user_id {
        clauses.push("user_id = ?");
        args.push(SqlValue::Integer(user_id));
    }
    if let Some(action) = &filter.action {
        clauses.push("action = ?");
        args.push(SqlValue::Text(action.clone()));
    }
    if let Some(model_type) = &filter.model_type {
        clauses.push("model_type = ?");
        args.push(SqlValue::Text(model_type.clone()));
    }
    if let Some(model_id) = filter.model_id {
        clauses.push("model_id = ?");
        args.push(SqlValue::Integer(model_id));
    }
    // Fixed-width timestamps compare correctly as text.
    if let Some(from) = &filter.date_from {
        clauses.push("created_at >= ?");
        args.push(SqlValue::Text(format_timestamp(from)));
    }
    if let Some(to) = &filter.date_to {
        clauses.push("created_at <= ?");
        args.push(SqlValue::Text(format_timestamp(to)));
    }
    (clauses.join(" AND "), args)
}
