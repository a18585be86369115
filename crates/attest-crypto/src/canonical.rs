//! Canonical JSON: sorted object keys, no whitespace.
//!
//! Used to build byte-identical signing messages at write and verify time.
//! Any change here invalidates every stored signature.

use serde_json::Value;

use crate::error::CryptoError;

fn quote(s: &str) -> Result<String, CryptoError> {
    serde_json::to_string(s).map_err(|e| CryptoError::SerializationError(e.to_string()))
}

/// Canonical JSON serialization: sorted keys, no whitespace.
/// Deterministic regardless of key insertion order.
pub fn canonical_json(value: &Value) -> Result<String, CryptoError> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(CryptoError::NonFiniteNumber);
                }
            }
            Ok(n.to_string())
        }
        Value::String(s) => quote(s),
        Value::Array(arr) => {
            let items: Result<Vec<String>, _> = arr.iter().map(canonical_json).collect();
            Ok(format!("[{}]", items?.join(",")))
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let pairs: Result<Vec<String>, CryptoError> = keys
                .iter()
                .map(|k| Ok(format!("{}:{}", quote(k)?, canonical_json(&obj[*k])?)))
                .collect();
            Ok(format!("{{{}}}", pairs?.join(",")))
        }
    }
}
