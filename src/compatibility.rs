//! Schema compatibility checking
//!
//! Diffs the top-level `properties` and `required` of two schema versions and
//! decides whether consumers of the elder can accept data shaped by the newer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use similar::TextDiff;

use crate::fingerprint::canonical_json;

/// Result of a compatibility check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    /// Whether the newer schema can replace the elder
    pub compatible: bool,
    /// Changes in detection order: removals, additions, changes, required set
    pub changes: Vec<SchemaChange>,
}

impl CompatibilityReport {
    /// Report for a schema with no prior version
    pub fn initial() -> Self {
        Self {
            compatible: true,
            changes: Vec::new(),
        }
    }

    pub fn breaking_changes(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter().filter(|c| c.breaking)
    }

    /// One-line summary for logs and CLIs
    pub fn summary(&self) -> String {
        let breaking = self.breaking_changes().count();
        match (self.changes.len(), breaking) {
            (0, _) => "No changes detected".to_string(),
            (n, 0) => format!("{} compatible changes detected", n),
            (n, b) => format!("{} changes detected, {} breaking", n, b),
        }
    }
}

/// A detected change between schema versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub kind: ChangeKind,
    /// Path to the changed element (e.g., "properties.name" or "required")
    pub path: String,
    pub description: String,
    pub breaking: bool,
    /// Line diff of the serialized element, for `change` entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
    Change,
}

/// Compatibility checker for schema versions
#[derive(Debug, Clone, Default)]
pub struct CompatibilityChecker {
    /// Strict mode - any change is considered breaking
    strict_mode: bool,
}

impl CompatibilityChecker {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Compare an elder schema against a newer one
    pub fn compare(&self, elder: &Value, newer: &Value) -> CompatibilityReport {
        let empty = Map::new();
        let old_props = properties(elder).unwrap_or(&empty);
        let new_props = properties(newer).unwrap_or(&empty);
        let old_required = required(elder);
        let new_required = required(newer);

        let mut changes = Vec::new();

        for name in old_props.keys().filter(|k| !new_props.contains_key(*k)) {
            let was_required = old_required.contains(name.as_str());
            changes.push(SchemaChange {
                kind: ChangeKind::Remove,
                path: format!("properties.{}", name),
                description: if was_required {
                    format!("Required property '{}' was removed (breaking)", name)
                } else {
                    format!("Optional property '{}' was removed", name)
                },
                breaking: was_required,
                diff: None,
            });
        }

        for name in new_props.keys().filter(|k| !old_props.contains_key(*k)) {
            changes.push(SchemaChange {
                kind: ChangeKind::Add,
                path: format!("properties.{}", name),
                description: format!("Property '{}' was added", name),
                breaking: false,
                diff: None,
            });
        }

        for (name, old_prop) in old_props {
            let Some(new_prop) = new_props.get(name) else { continue };
            if canonical_json(old_prop) == canonical_json(new_prop) {
                continue;
            }
            let type_changed = old_prop.get("type") != new_prop.get("type");
            changes.push(SchemaChange {
                kind: ChangeKind::Change,
                path: format!("properties.{}", name),
                description: if type_changed {
                    format!(
                        "Property '{}' type changed from {} to {} (breaking)",
                        name,
                        type_label(old_prop),
                        type_label(new_prop)
                    )
                } else {
                    format!("Property '{}' constraints changed", name)
                },
                breaking: type_changed,
                diff: Some(line_diff(old_prop, new_prop)),
            });
        }

        let added: Vec<&str> = new_required.difference(&old_required).copied().collect();
        if !added.is_empty() {
            changes.push(SchemaChange {
                kind: ChangeKind::Add,
                path: "required".to_string(),
                description: format!("Required properties added: {} (breaking)", added.join(", ")),
                breaking: true,
                diff: None,
            });
        }

        let removed: Vec<&str> = old_required.difference(&new_required).copied().collect();
        if !removed.is_empty() {
            changes.push(SchemaChange {
                kind: ChangeKind::Remove,
                path: "required".to_string(),
                description: format!("Properties no longer required: {}", removed.join(", ")),
                breaking: false,
                diff: None,
            });
        }

        if self.strict_mode {
            for change in &mut changes {
                change.breaking = true;
            }
        }

        CompatibilityReport {
            compatible: !changes.iter().any(|c| c.breaking),
            changes,
        }
    }
}

fn properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

fn required(schema: &Value) -> BTreeSet<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn type_label(prop: &Value) -> String {
    prop.get("type").map(Value::to_string).unwrap_or_else(|| "any".to_string())
}

fn line_diff(old: &Value, new: &Value) -> String {
    let old_text = serde_json::to_string_pretty(old).unwrap_or_else(|_| old.to_string());
    let new_text = serde_json::to_string_pretty(new).unwrap_or_else(|_| new.to_string());
    let diff = TextDiff::from_lines(&old_text, &new_text);
    let mut unified = diff.unified_diff();
    unified.context_radius(1);
    unified.to_string()
}
