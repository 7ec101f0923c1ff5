//! Non-validating reshaping of data
//!
//! Works on a copy and never rejects anything: defaults fill gaps, strings are
//! cleaned, and undeclared properties can be dropped. Running it twice gives
//! the same result as running it once.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{Additional, Items, SchemaNode};

/// Flags for `sanitize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeOptions {
    pub apply_defaults: bool,
    pub trim_strings: bool,
    pub strip_html: bool,
    /// Drop properties not declared in `properties` where `additionalProperties` is false
    pub remove_additional: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            apply_defaults: true,
            trim_strings: true,
            strip_html: true,
            remove_additional: false,
        }
    }
}

fn markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup regex"))
}

pub fn sanitize(data: &Value, schema: &SchemaNode, options: &SanitizeOptions) -> Value {
    walk(data.clone(), schema, options)
}

fn walk(value: Value, node: &SchemaNode, options: &SanitizeOptions) -> Value {
    match value {
        Value::String(s) => Value::String(clean(s, options)),
        Value::Object(mut map) => {
            let any = SchemaNode::any();
            let Some(rules) = node.object_rules() else {
                for slot in map.values_mut() {
                    *slot = walk(slot.take(), &any, options);
                }
                return Value::Object(map);
            };

            if options.apply_defaults {
                super::validate::apply_defaults(&mut map, rules);
            }
            if options.remove_additional && matches!(rules.additional, Additional::Forbidden) {
                map.retain(|key, _| rules.properties.contains_key(key));
            }

            for (key, slot) in map.iter_mut() {
                let child = match (rules.properties.get(key), &rules.additional) {
                    (Some(prop), _) => prop,
                    (None, Additional::Schema(schema)) => schema.as_ref(),
                    (None, _) => &any,
                };
                *slot = walk(slot.take(), child, options);
            }
            Value::Object(map)
        }
        Value::Array(items) => {
            let any = SchemaNode::any();
            let rules = node.array_rules();
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let child = match rules.map(|r| (&r.items, &r.additional_items)) {
                        Some((Items::Single(schema), _)) => schema.as_ref(),
                        Some((Items::Tuple(list), additional)) => match (list.get(i), additional) {
                            (Some(schema), _) => schema,
                            (None, Additional::Schema(schema)) => schema.as_ref(),
                            (None, _) => &any,
                        },
                        Some((Items::Any, _)) | None => &any,
                    };
                    walk(item, child, options)
                })
                .collect()
        }
        scalar => scalar,
    }
}

fn clean(s: String, options: &SanitizeOptions) -> String {
    let stripped = if options.strip_html {
        markup().replace_all(&s, "").into_owned()
    } else {
        s
    };
    if options.trim_strings {
        stripped.trim().to_string()
    } else {
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaNode {
        SchemaNode::from_value(&json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "name": { "type": "string" },
                "role": { "type": "string", "default": "  <i>member</i> " },
                "profile": {
                    "type": "object",
                    "properties": { "bio": { "type": "string" }, "lang": { "default": "en" } }
                },
                "tags": { "type": "array", "items": { "type": "string" } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_sanitize_reshapes_copy() {
        let data = json!({
            "name": "  <b>Ada</b> Lovelace ",
            "profile": { "bio": "<script>x</script>hi" },
            "tags": [" a ", "<p>b</p>"],
            "junk": 1
        });
        let options = SanitizeOptions { remove_additional: true, ..Default::default() };
        let clean = sanitize(&data, &schema(), &options);

        assert_eq!(
            clean,
            json!({
                "name": "Ada Lovelace",
                "role": "member",
                "profile": { "bio": "xhi", "lang": "en" },
                "tags": ["a", "b"]
            })
        );
        // Caller's data is untouched
        assert_eq!(data["junk"], json!(1));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let data = json!({
            "name": " <<b>x> y < z ",
            "profile": {},
            "tags": ["  ", "<a href='x'>link</a>"],
            "junk": { "k": " v " }
        });
        let s = schema();
        for options in [
            SanitizeOptions::default(),
            SanitizeOptions { remove_additional: true, ..Default::default() },
            SanitizeOptions { trim_strings: false, ..Default::default() },
        ] {
            let once = sanitize(&data, &s, &options);
            let twice = sanitize(&once, &s, &options);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_toggles() {
        let options = SanitizeOptions {
            apply_defaults: false,
            trim_strings: false,
            strip_html: false,
            remove_additional: false,
        };
        let data = json!({ "name": " <b>x</b> ", "junk": 1 });
        assert_eq!(sanitize(&data, &schema(), &options), data);
    }
}
