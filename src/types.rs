//! Shared request/response types: actor context, pagination, timestamps.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub use attest_store::TenantId;

use crate::error::{Result, VaultError};

// ============================================================================
// ActorContext
// ============================================================================

/// Who is acting, explicitly threaded through every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub tenant_id: TenantId,
    /// `None` for system actions.
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ActorContext {
    /// A system actor for `tenant` (no user, no request metadata).
    pub fn system(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            user_id: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn user(tenant_id: TenantId, user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::system(tenant_id)
        }
    }

    pub fn with_request(mut self, ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self.user_agent = Some(user_agent.into());
        self
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Hard upper bound on page size regardless of configuration.
pub const MAX_PER_PAGE: u32 = 100;

/// A 1-based page request with a clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    /// Clamp `page` to >= 1 and `per_page` to `1..=max_per_page`
    /// (itself capped at [`MAX_PER_PAGE`]).
    pub fn new(page: u32, per_page: u32, max_per_page: u32) -> Self {
        let max = max_per_page.clamp(1, MAX_PER_PAGE);
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, max),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 25, MAX_PER_PAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: Page) -> Self {
        let last_page = total.div_ceil(u64::from(page.per_page)).max(1);
        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Fixed-width RFC 3339 UTC with microseconds. Lexicographic order equals
/// chronological order, and it is the exact text that gets signed.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Current time truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VaultError::InvalidInput(format!("bad timestamp {:?}: {}", raw, e)))
}

/// A persisted timestamp: the exact stored text alongside its parsed value.
///
/// Serializes as the stored text, never re-rendered, so whatever was signed
/// is what gets exported and verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    text: String,
    at: DateTime<Utc>,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from(now())
    }

    /// Parse stored text, keeping it byte for byte.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let text = raw.into();
        let at = parse_timestamp(&text)?;
        Ok(Self { text, at })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.at
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self {
            text: format_timestamp(&at),
            at,
        }
    }
}

impl TryFrom<String> for Timestamp {
    type Error = VaultError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(raw)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> String {
        ts.text
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
