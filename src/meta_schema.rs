//! Authoring check for schemas
//!
//! Schemas are checked against an embedded Draft-07 subset before the
//! registry stores them. Type names are left open so custom types pass.

use std::sync::OnceLock;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::error::{Result, SchemaError};

const META_SCHEMA: &str = include_str!("meta_schema.json");

fn compiled() -> std::result::Result<&'static JSONSchema, String> {
    static COMPILED: OnceLock<std::result::Result<JSONSchema, String>> = OnceLock::new();
    COMPILED
        .get_or_init(|| {
            let value: Value = serde_json::from_str(META_SCHEMA).map_err(|e| e.to_string())?;
            JSONSchema::options()
                .with_draft(Draft::Draft7)
                .compile(&value)
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// The embedded meta-schema document
pub fn meta_schema() -> Result<Value> {
    Ok(serde_json::from_str(META_SCHEMA)?)
}

/// Check `schema` against the meta-schema, listing every violation
pub fn check(id: &str, schema: &Value) -> Result<()> {
    let compiled = compiled().map_err(|reason| SchemaError::invalid("meta-schema", reason))?;
    if let Err(errors) = compiled.validate(schema) {
        let reasons = errors
            .map(|e| {
                let at = e.instance_path.to_string();
                if at.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", at, e)
                }
            })
            .collect();
        return Err(SchemaError::InvalidSchema { id: id.to_string(), reasons });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_well_formed_schema() {
        let schema = json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "tags": { "type": "array", "items": { "type": "string" }, "uniqueItems": true },
                "price": { "type": ["money", "null"] },
                "kind": { "oneOf": [{ "enum": ["a"] }, { "type": "integer", "minimum": 0 }] }
            },
            "additionalProperties": false
        });
        check("ns.item", &schema).unwrap();
    }

    #[test]
    fn test_rejects_malformed_schema() {
        let schema = json!({
            "type": 7,
            "minLength": -1,
            "properties": { "a": { "required": "yes" } }
        });
        match check("ns.bad", &schema) {
            Err(SchemaError::InvalidSchema { id, reasons }) => {
                assert_eq!(id, "ns.bad");
                assert!(reasons.len() >= 3, "{:?}", reasons);
            }
            other => panic!("Expected InvalidSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_meta_schema_is_parseable() {
        assert!(meta_schema().unwrap().get("properties").is_some());
    }
}
