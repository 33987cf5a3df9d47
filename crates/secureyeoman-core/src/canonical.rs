//! Canonical JSON encoding.
//!
//! The audit chain hashes entries over a deterministic byte encoding, and
//! the task loop guard compares tool arguments by canonical form. Rules:
//! UTF-8, object keys sorted lexicographically, no insignificant whitespace,
//! integers only. Values containing non-integer numbers are rejected rather
//! than rounded.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors from canonicalization.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// The value contains a float, which has no deterministic encoding.
    #[error("non-integer number at {path}")]
    NonIntegerNumber {
        /// JSON-pointer-ish path to the offending value.
        path: String,
    },

    /// The value could not be serialized at all.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serialize any value to its canonical JSON string.
///
/// # Errors
///
/// Returns an error if the value contains non-integer numbers or fails to
/// serialize.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let value = serde_json::to_value(value)?;
    canonical_json_value(&value)
}

/// Canonicalize an already-parsed JSON value.
///
/// # Errors
///
/// Returns [`CanonicalError::NonIntegerNumber`] if any number in the tree is
/// not an integer.
pub fn canonical_json_value(value: &Value) -> Result<String, CanonicalError> {
    let mut out = String::new();
    write_value(value, "$", &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, path: &str, out: &mut String) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&i.to_string());
            } else if let Some(u) = n.as_u64() {
                out.push_str(&u.to_string());
            } else {
                return Err(CanonicalError::NonIntegerNumber {
                    path: path.to_string(),
                });
            }
        },
        Value::String(s) => {
            // serde_json's string escaping is deterministic.
            out.push_str(&serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()));
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, &format!("{path}[{i}]"), out)?;
            }
            out.push(']');
        },
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string()));
                out.push(':');
                if let Some(v) = map.get(*key) {
                    write_value(v, &format!("{path}.{key}"), out)?;
                }
            }
            out.push('}');
        },
    }
    Ok(())
}
