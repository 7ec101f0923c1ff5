//! Content fingerprints for schemas
//!
//! Fingerprints hash a canonical serialization (object keys sorted at every
//! depth), so authoring order never changes the result.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Top-level keys injected by the registry; they never affect a fingerprint
const IDENTITY_KEYS: &[&str] = &["$id", "$schema"];

/// SHA256 fingerprint of schema content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a schema, ignoring registry-injected identifiers
    pub fn of_schema(schema: &Value) -> Self {
        match schema {
            Value::Object(map) if IDENTITY_KEYS.iter().any(|k| map.contains_key(*k)) => {
                let mut content = map.clone();
                for key in IDENTITY_KEYS {
                    content.remove(*key);
                }
                Self::of_value(&Value::Object(content))
            }
            _ => Self::of_value(schema),
        }
    }

    /// Fingerprint of any JSON value
    pub fn of_value(value: &Value) -> Self {
        let hash = Sha256::digest(canonical_json(value).as_bytes());
        Self(format!("{:x}", hash))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `schema` still hashes to this fingerprint
    pub fn matches(&self, schema: &Value) -> bool {
        *self == Self::of_schema(schema)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Serialize with object keys sorted at every depth
///
/// Floats with no fractional part are written as integers, so `1` and `1.0`
/// share a key. Also the content key used for `enum` and `uniqueItems`
/// comparisons.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                out.push_str(&(f as i64).to_string())
            }
            _ => out.push_str(&n.to_string()),
        },
        scalar => out.push_str(&scalar.to_string()),
    }
}
