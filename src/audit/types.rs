use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{TenantId, Timestamp};

/// Structured audit metadata. Keys are sorted so serialization is stable.
pub type AuditPayload = BTreeMap<String, PayloadValue>;

/// A payload value.
///
/// Floats are deliberately absent: their text form is not stable across
/// encoders, and a signed message must re-serialize byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<PayloadValue>),
    Map(BTreeMap<String, PayloadValue>),
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Int(value)
    }
}

impl From<u32> for PayloadValue {
    fn from(value: u32) -> Self {
        PayloadValue::Int(i64::from(value))
    }
}

impl From<usize> for PayloadValue {
    fn from(value: usize) -> Self {
        PayloadValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u64> for PayloadValue {
    fn from(value: u64) -> Self {
        PayloadValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

impl<T: Into<PayloadValue>> From<Option<T>> for PayloadValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PayloadValue::Null, Into::into)
    }
}

impl<T: Into<PayloadValue>> From<Vec<T>> for PayloadValue {
    fn from(value: Vec<T>) -> Self {
        PayloadValue::List(value.into_iter().map(Into::into).collect())
    }
}

/// One action about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub action: String,
    pub model_type: String,
    pub model_id: Option<i64>,
    pub payload: AuditPayload,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, model_type: impl Into<String>, model_id: Option<i64>) -> Self {
        Self {
            action: action.into(),
            model_type: model_type.into(),
            model_id,
            payload: AuditPayload::new(),
        }
    }

    /// Add one payload field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// An immutable, signed record of who did what to which entity, when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub tenant_id: TenantId,
    pub user_id: Option<i64>,
    pub action: String,
    pub model_type: String,
    pub model_id: Option<i64>,
    pub payload: AuditPayload,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Stored text of the creation time; this exact text is signed.
    pub created_at: Timestamp,
    /// Hex HMAC-SHA256 over the canonical form of every field above except `id`.
    pub signature: String,
}

/// Query filters. Tenant scoping is applied separately and always.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub model_type: Option<String>,
    pub model_id: Option<i64>,
    /// Inclusive lower bound.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub date_to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn model(model_type: impl Into<String>, model_id: i64) -> Self {
        Self {
            model_type: Some(model_type.into()),
            model_id: Some(model_id),
            ..Self::default()
        }
    }
}

/// An entry together with the outcome of re-verifying its signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedEntry {
    pub entry: AuditLogEntry,
    pub verified: bool,
}
