//! Audit log exports. Both formats carry every field, signature included,
//! so a holder of the signing key can verify an export offline.

use super::trail::AuditTrail;
use super::types::{AuditFilter, AuditLogEntry};
use crate::error::Result;
use crate::types::TenantId;

const CSV_HEADER: [&str; 11] = [
    "id",
    "tenant_id",
    "user_id",
    "action",
    "model_type",
    "model_id",
    "payload",
    "ip_address",
    "user_agent",
    "created_at",
    "signature",
];

/// RFC 4180 field quoting.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Header row plus one CRLF-terminated row per entry.
pub fn entries_to_csv(entries: &[AuditLogEntry]) -> Result<String> {
    let mut out = CSV_HEADER.join(",");
    out.push_str("\r\n");
    for entry in entries {
        let row = [
            entry.id.to_string(),
            entry.tenant_id.to_string(),
            opt(&entry.user_id),
            entry.action.clone(),
            entry.model_type.clone(),
            opt(&entry.model_id),
            serde_json::to_string(&entry.payload)?,
            opt(&entry.ip_address),
            opt(&entry.user_agent),
            entry.created_at.to_string(),
            entry.signature.clone(),
        ];
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }
    Ok(out)
}

pub fn entries_to_json(entries: &[AuditLogEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

impl AuditTrail {
    /// Tabular export of every matching entry, newest first.
    pub fn export_csv(&self, tenant: TenantId, filter: &AuditFilter) -> Result<String> {
        entries_to_csv(&self.entries(tenant, filter)?)
    }

    /// JSON array of every matching entry, newest first.
    pub fn export_json(&self, tenant: TenantId, filter: &AuditFilter) -> Result<String> {
        entries_to_json(&self.entries(tenant, filter)?)
    }
}
