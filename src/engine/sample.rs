//! Representative instances of a schema
//!
//! Output is fully deterministic so samples can back golden files. Each call
//! carries a `variant` index; array elements under `uniqueItems` use distinct
//! variants to avoid producing duplicates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::plugins::Plugins;
use crate::schema::{Additional, ArrayRules, Items, Kind, NumberRules, ObjectRules, SchemaNode, StringRules};

/// Arrays without `maxItems` stop growing here
const DEFAULT_MAX_ITEMS: usize = 5;

const FILLER: &str = "string";

/// Flags for `generate_sample`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleOptions {
    /// Prefer a node's `example` when present
    pub use_examples: bool,
    /// Fall back to a node's `default` when present
    pub use_defaults: bool,
    /// Only emit required object properties
    pub required_only: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            use_examples: true,
            use_defaults: true,
            required_only: false,
        }
    }
}

pub(crate) struct Sampler<'a> {
    plugins: &'a Plugins,
    options: &'a SampleOptions,
}

impl<'a> Sampler<'a> {
    pub(crate) fn new(plugins: &'a Plugins, options: &'a SampleOptions) -> Self {
        Self { plugins, options }
    }

    pub(crate) fn sample(&self, node: &SchemaNode) -> Value {
        self.node(node, 0)
    }

    fn node(&self, node: &SchemaNode, variant: usize) -> Value {
        if variant == 0 {
            if self.options.use_examples {
                if let Some(example) = &node.example {
                    return example.clone();
                }
            }
            if self.options.use_defaults {
                if let Some(default) = &node.default {
                    return default.clone();
                }
            }
        }
        if let Some(values) = node.enum_values.as_ref().filter(|v| !v.is_empty()) {
            return values[variant % values.len()].clone();
        }

        let kind = node
            .kinds
            .iter()
            .find(|k| !matches!(k, Kind::Null))
            .or_else(|| node.kinds.first());

        match kind {
            Some(Kind::String(rules)) => Value::String(self.string(rules, variant)),
            Some(Kind::Number(rules)) => number(rules, false, variant),
            Some(Kind::Integer(rules)) => number(rules, true, variant),
            Some(Kind::Boolean) => Value::Bool(variant % 2 == 1),
            Some(Kind::Null) => Value::Null,
            Some(Kind::Object(rules)) => self.object(rules, variant),
            Some(Kind::Array(rules)) => self.array(rules, variant),
            Some(Kind::Custom(name)) => self
                .plugins
                .types
                .get(name)
                .and_then(|t| t.sample(node))
                .unwrap_or(Value::Null),
            None => match node.all_of.first().or(node.any_of.first()).or(node.one_of.first()) {
                Some(branch) => self.node(branch, variant),
                None => Value::Null,
            },
        }
    }

    fn string(&self, rules: &StringRules, variant: usize) -> String {
        if let Some(format) = rules.format.as_deref().and_then(|f| self.plugins.formats.get(f)) {
            // A variant that fails its own format falls back to the base sample
            let sample = format
                .sample_variant(variant)
                .filter(|s| variant == 0 || s.as_str().is_some_and(|s| format.validate(s)))
                .or_else(|| format.sample());
            if let Some(Value::String(s)) = sample {
                return s;
            }
        }

        let filler = fill(rules, variant);
        match &rules.pattern {
            Some(pattern) if !pattern.regex.is_match(&filler) => format!("<{}>", pattern.source),
            _ => filler,
        }
    }

    fn object(&self, rules: &ObjectRules, variant: usize) -> Value {
        let mut map = Map::new();

        for (key, prop) in &rules.properties {
            if prop.is_never() || (self.options.required_only && !rules.is_required(key)) {
                continue;
            }
            map.insert(key.clone(), self.node(prop, variant));
        }
        for key in &rules.required {
            if !map.contains_key(key) {
                map.insert(key.clone(), self.extra(&rules.additional, 0));
            }
        }

        // Top up to minProperties, declared properties first
        if let Some(min) = rules.min_properties {
            for (key, prop) in &rules.properties {
                if map.len() >= min {
                    break;
                }
                if !prop.is_never() && !map.contains_key(key) {
                    map.insert(key.clone(), self.node(prop, 0));
                }
            }
            let mut i = 0;
            while map.len() < min && !matches!(rules.additional, Additional::Forbidden) {
                let key = format!("property{}", i);
                if !map.contains_key(&key) {
                    map.insert(key, self.extra(&rules.additional, i));
                }
                i += 1;
            }
        }

        // Nothing else tells variants apart, so name an extra property after it
        if variant > 0
            && map.is_empty()
            && rules.max_properties != Some(0)
            && !matches!(rules.additional, Additional::Forbidden)
        {
            map.insert(format!("property{}", variant), self.extra(&rules.additional, variant));
        }

        Value::Object(map)
    }

    fn array(&self, rules: &ArrayRules, offset: usize) -> Value {
        if matches!(&rules.items, Items::Single(schema) if schema.is_never()) {
            return Value::Array(Vec::new());
        }
        let min = rules.min_items.unwrap_or(0);
        let mut count = (min + 1).min(rules.max_items.unwrap_or(DEFAULT_MAX_ITEMS)).max(min);
        let variant = |i: usize| if rules.unique_items { offset + i } else { offset };

        match &rules.items {
            Items::Any => (0..count)
                .map(|i| if rules.unique_items || offset > 0 { Value::from(variant(i)) } else { Value::Null })
                .collect(),
            Items::Single(schema) => (0..count).map(|i| self.node(schema, variant(i))).collect(),
            Items::Tuple(schemas) => {
                count = count.max(schemas.len());
                if matches!(rules.additional_items, Additional::Forbidden) {
                    count = count.min(schemas.len());
                }
                (0..count)
                    .map(|i| match schemas.get(i) {
                        Some(schema) => self.node(schema, variant(i)),
                        None => self.extra(&rules.additional_items, variant(i)),
                    })
                    .collect()
            }
        }
    }

    fn extra(&self, additional: &Additional, variant: usize) -> Value {
        match additional {
            Additional::Schema(schema) => self.node(schema, variant),
            Additional::Allowed | Additional::Forbidden => Value::Null,
        }
    }
}

/// Length-bounded filler text; the variant suffix always survives `maxLength`
fn fill(rules: &StringRules, variant: usize) -> String {
    let suffix = if variant == 0 { String::new() } else { variant.to_string() };
    let natural = FILLER.len() + suffix.len();
    let target = natural
        .max(rules.min_length.unwrap_or(0))
        .min(rules.max_length.unwrap_or(usize::MAX));

    if suffix.len() >= target {
        return suffix[suffix.len() - target..].to_string();
    }
    let mut text: String = FILLER
        .chars()
        .chain(std::iter::repeat('x'))
        .take(target - suffix.len())
        .collect();
    text.push_str(&suffix);
    text
}

fn number(rules: &NumberRules, integer: bool, variant: usize) -> Value {
    let step = rules.multiple_of.unwrap_or(1.0);
    let fit_up = |n: f64| {
        let n = match rules.multiple_of {
            Some(m) => (n / m).ceil() * m,
            None => n,
        };
        if integer { n.ceil() } else { n }
    };
    let fit_down = |n: f64| {
        let n = match rules.multiple_of {
            Some(m) => (n / m).floor() * m,
            None => n,
        };
        if integer { n.floor() } else { n }
    };

    let start = match (rules.minimum, rules.exclusive_minimum) {
        (Some(min), _) => min,
        (None, Some(ex)) => ex + step,
        (None, None) => 0.0,
    };
    let mut n = fit_up(start + variant as f64 * step);

    if let Some(max) = rules.maximum {
        if n > max {
            n = fit_down(max);
        }
    }
    if let Some(ex) = rules.exclusive_maximum {
        if n >= ex {
            n = fit_down(ex - step);
        }
    }

    if (integer || n.fract() == 0.0) && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SchemaEngine, ValidationOptions};
    use crate::plugins::{CustomFormat, CustomType};
    use serde_json::json;

    fn sample(schema: Value) -> Value {
        let node = SchemaNode::from_value(&schema).unwrap();
        SchemaEngine::new().generate_sample(&node, &SampleOptions::default())
    }

    fn assert_round_trip(schema: Value) {
        let engine = SchemaEngine::new();
        let node = SchemaNode::from_value(&schema).unwrap();
        let value = engine.generate_sample(&node, &SampleOptions::default());
        let result = engine.validate(&value, &node, &ValidationOptions::default()).unwrap();
        assert!(result.valid, "sample {} invalid for {}: {:?}", value, schema, result.errors);
    }

    #[test]
    fn test_scalar_samples() {
        assert_eq!(sample(json!({ "type": "string", "format": "email" })), json!("user@example.com"));
        assert_eq!(sample(json!({ "type": "string", "enum": ["b", "a"] })), json!("b"));
        assert_eq!(sample(json!({ "type": "string", "minLength": 8 })), json!("stringxx"));
        assert_eq!(sample(json!({ "type": "string", "maxLength": 3 })), json!("str"));
        assert_eq!(sample(json!({ "type": "number", "minimum": 5 })), json!(5));
        assert_eq!(sample(json!({ "type": "integer" })), json!(0));
        assert_eq!(sample(json!({ "type": "boolean" })), json!(false));
        assert_eq!(sample(json!({ "type": "string", "example": "hi", "default": "yo" })), json!("hi"));
    }

    #[test]
    fn test_object_and_array_samples() {
        let schema = json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "tags": { "type": "array", "items": { "type": "string" }, "minItems": 2 },
                "note": { "type": "string" }
            }
        });
        assert_eq!(
            sample(schema.clone()),
            json!({
                "id": "123e4567-e89b-12d3-a456-426614174000",
                "note": "string",
                "tags": ["string", "string", "string"]
            })
        );

        let node = SchemaNode::from_value(&schema).unwrap();
        let options = SampleOptions { required_only: true, ..Default::default() };
        let value = SchemaEngine::new().generate_sample(&node, &options);
        assert_eq!(value, json!({ "id": "123e4567-e89b-12d3-a456-426614174000" }));
    }

    #[test]
    fn test_sample_is_deterministic() {
        let schema = json!({ "type": "object", "properties": { "a": { "type": "number" }, "b": { "type": "array" } } });
        assert_eq!(sample(schema.clone()), sample(schema));
    }

    #[test]
    fn test_custom_type_sample() {
        let mut plugins = Plugins::default();
        plugins.types.register(
            "money",
            CustomType::new(|v, _| v.is_string()).with_sample(|_| json!("0.00 EUR")),
        );
        let engine = SchemaEngine::with_plugins(plugins);
        let node = SchemaNode::from_value(&json!({ "type": "money" })).unwrap();
        assert_eq!(engine.generate_sample(&node, &SampleOptions::default()), json!("0.00 EUR"));
    }

    #[test]
    fn test_samples_validate_for_every_kind() {
        assert_round_trip(json!({ "type": "string", "minLength": 2, "maxLength": 4 }));
        assert_round_trip(json!({ "type": "string", "format": "date-time" }));
        assert_round_trip(json!({ "type": "string", "pattern": "^str" }));
        assert_round_trip(json!({ "type": "number", "exclusiveMinimum": 1.5, "multipleOf": 0.5 }));
        assert_round_trip(json!({ "type": "integer", "minimum": -10, "maximum": -3 }));
        assert_round_trip(json!({ "type": "integer", "exclusiveMaximum": 0 }));
        assert_round_trip(json!({ "type": "boolean" }));
        assert_round_trip(json!({ "type": "null" }));
        assert_round_trip(json!({ "type": ["null", "integer"], "minimum": 3 }));
        assert_round_trip(json!({ "type": "array", "items": { "type": "integer" }, "minItems": 3, "uniqueItems": true }));
        assert_round_trip(json!({ "type": "array", "items": { "type": "boolean" }, "maxItems": 2, "uniqueItems": true }));
        assert_round_trip(json!({
            "type": "array",
            "items": { "type": "object", "properties": { "n": { "type": "integer" } } },
            "minItems": 2,
            "uniqueItems": true
        }));
        assert_round_trip(json!({
            "type": "array",
            "items": [{ "type": "string" }, { "type": "integer" }],
            "additionalItems": false,
            "minItems": 2
        }));
        assert_round_trip(json!({
            "type": "object",
            "required": ["a", "z"],
            "minProperties": 4,
            "properties": {
                "a": { "type": "object", "properties": { "b": { "type": "string", "enum": ["x"] } } }
            },
            "additionalProperties": { "type": "integer" }
        }));
        assert_round_trip(json!({ "anyOf": [{ "type": "string" }, { "type": "integer" }] }));
        assert_round_trip(json!({
            "type": "object",
            "properties": { "legacy": false, "tags": { "type": "array", "items": false } }
        }));
        assert_round_trip(json!({
            "type": "array",
            "items": { "type": "string", "format": "email" },
            "minItems": 1,
            "uniqueItems": true
        }));
        assert_round_trip(json!({
            "type": "array",
            "items": { "type": "string", "maxLength": 3 },
            "minItems": 2,
            "uniqueItems": true
        }));
        assert_round_trip(json!({ "type": "array", "items": { "type": "object" }, "minItems": 2, "uniqueItems": true }));
        assert_round_trip(json!({
            "type": "array",
            "items": { "type": "array", "items": { "type": "integer" }, "maxItems": 1 },
            "minItems": 2,
            "uniqueItems": true
        }));
    }

    #[test]
    fn test_unique_items_vary_every_element() {
        assert_eq!(
            sample(json!({
                "type": "array", "items": { "type": "string", "format": "email" }, "minItems": 1, "maxItems": 2, "uniqueItems": true
            })),
            json!(["user@example.com", "user1@example.com"])
        );
        assert_eq!(
            sample(json!({
                "type": "array", "items": { "type": "string", "maxLength": 3 }, "minItems": 3, "maxItems": 3, "uniqueItems": true
            })),
            json!(["str", "st1", "st2"])
        );
        assert_eq!(
            sample(json!({ "type": "array", "items": { "type": "object" }, "maxItems": 2, "minItems": 2, "uniqueItems": true })),
            json!([{}, { "property1": null }])
        );
    }

    #[test]
    fn test_format_variant_falls_back_when_invalid() {
        let mut plugins = Plugins::default();
        plugins.formats.register(
            "code",
            CustomFormat::new(|s| s == "A1", "must be A1").with_sample_variants(|n| json!(format!("A{}", n + 1))),
        );
        let engine = SchemaEngine::with_plugins(plugins);
        let node = SchemaNode::from_value(&json!({
            "type": "array", "items": { "type": "string", "format": "code" }, "minItems": 2, "maxItems": 2
        }))
        .unwrap();
        assert_eq!(engine.generate_sample(&node, &SampleOptions::default()), json!(["A1", "A1"]));

        let unique = SchemaNode::from_value(&json!({
            "type": "array", "items": { "type": "string", "format": "code" }, "minItems": 2, "maxItems": 2, "uniqueItems": true
        }))
        .unwrap();
        assert_eq!(engine.generate_sample(&unique, &SampleOptions::default()), json!(["A1", "A1"]));
    }
}
