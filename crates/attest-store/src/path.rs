//! Object paths and the tenant-scoped layouts built on them.
//!
//! Evidence: `tenants/{tenant}/evidences/{uuid}_v{version}`
//! Exports:  `exports/{tenant}/{kind}_{id}_{timestamp}.{ext}`
//!
//! Paths never derive from user-supplied filenames.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Isolated customer/organization context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, provider-agnostic relative object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Validate a `/`-separated relative path.
    ///
    /// Rejects empty input, absolute paths, backslashes, NUL bytes and
    /// empty, `.` or `..` segments.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let invalid = |reason| StoreError::InvalidPath {
            path: raw.clone(),
            reason,
        };
        if raw.is_empty() {
            return Err(invalid("empty path"));
        }
        if raw.starts_with('/') {
            return Err(invalid("absolute path"));
        }
        if raw.contains('\\') || raw.contains('\0') {
            return Err(invalid("forbidden character"));
        }
        if raw
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(invalid("empty or relative segment"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// True if this path lies under `prefix` (segment-aligned).
    pub fn starts_with(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        self.0.len() > prefix.len()
            && self.0.starts_with(prefix)
            && self.0.as_bytes()[prefix.len()] == b'/'
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        ObjectPath::parse(value)
    }
}

impl From<ObjectPath> for String {
    fn from(value: ObjectPath) -> Self {
        value.0
    }
}

/// `tenants/{tenant}/evidences`
pub fn evidence_prefix(tenant: TenantId) -> String {
    format!("tenants/{}/evidences", tenant)
}

/// `exports/{tenant}`
pub fn export_prefix(tenant: TenantId) -> String {
    format!("exports/{}", tenant)
}

/// Storage path for one evidence version.
pub fn evidence_path(tenant: TenantId, evidence_uuid: &str, version: u32) -> Result<ObjectPath> {
    ObjectPath::parse(format!(
        "{}/{}_v{}",
        evidence_prefix(tenant),
        evidence_uuid,
        version
    ))
}

/// Storage path for an export artifact.
///
/// `kind` and `ext` must be simple tokens (ASCII alphanumerics, `-`, `_`).
pub fn export_path(
    tenant: TenantId,
    kind: &str,
    id: &str,
    timestamp: i64,
    ext: &str,
) -> Result<ObjectPath> {
    for token in [kind, id, ext] {
        if token.is_empty()
            || !token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StoreError::InvalidPath {
                path: format!("{}_{}_{}.{}", kind, id, timestamp, ext),
                reason: "export name tokens must be alphanumeric, '-' or '_'",
            });
        }
    }
    ObjectPath::parse(format!(
        "{}/{}_{}_{}.{}",
        export_prefix(tenant),
        kind,
        id,
        timestamp,
        ext
    ))
}

/// Reject a path that does not live under `prefix`.
///
/// ObjectStore providers do not enforce tenancy; every consumer calls this
/// before reading or deleting a stored locator.
pub fn ensure_scoped(path: &ObjectPath, prefix: &str) -> Result<()> {
    if path.starts_with(prefix) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "outside the tenant prefix",
        })
    }
}
