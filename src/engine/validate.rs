//! Recursive validation walk
//!
//! Every check appends to a shared error list instead of returning early, so
//! one pass reports every violation. The walk owns the value it visits and
//! hands back the (possibly coerced or defaulted) replacement, which is how
//! coerced values reach their parent container.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use serde_json::{Map, Value};
use tracing::debug;

use super::coerce;
use super::{ValidationContext, ValidationError, ValidationErrorKind};
use crate::fingerprint::canonical_json;
use crate::plugins::Plugins;
use crate::schema::{json_type_name, Additional, ArrayRules, Items, Kind, NumberRules, ObjectRules, SchemaNode, StringRules};

/// Relative tolerance for `multipleOf` on floating-point quotients
const MULTIPLE_OF_TOLERANCE: f64 = 1e-9;

type Errors = Vec<ValidationError>;

enum Resolved<'n> {
    Kind(&'n Kind),
    Any,
    Mismatch,
}

pub(crate) struct Validator<'p> {
    plugins: &'p Plugins,
}

impl<'p> Validator<'p> {
    pub(crate) fn new(plugins: &'p Plugins) -> Self {
        Self { plugins }
    }

    pub(crate) fn run(&self, value: Value, node: &SchemaNode, ctx: &ValidationContext<'_>) -> (Value, Errors) {
        let mut errors = Vec::new();
        let value = self.node(value, node, ctx, &mut errors);
        (value, errors)
    }

    fn node(&self, mut value: Value, node: &SchemaNode, ctx: &ValidationContext<'_>, errors: &mut Errors) -> Value {
        let start = errors.len();

        let kind = if value.is_null() {
            if !node.accepts_null() {
                errors.push(type_error(&value, node, ctx));
                return value;
            }
            None
        } else {
            match self.resolve_kind(&value, node) {
                Resolved::Kind(kind) => Some(kind),
                Resolved::Any => None,
                Resolved::Mismatch => match self.coerce(&value, node, ctx) {
                    Some((kind, coerced)) => {
                        value = coerced;
                        Some(kind)
                    }
                    None => {
                        errors.push(type_error(&value, node, ctx));
                        return value;
                    }
                },
            }
        };

        if let Some(allowed) = &node.enum_values {
            let key = canonical_json(&value);
            if !allowed.iter().any(|candidate| canonical_json(candidate) == key) {
                errors.push(error(
                    ctx,
                    ValidationErrorKind::Enum { allowed: allowed.clone() },
                    "must be equal to one of the allowed values".to_string(),
                ));
            }
        }

        match kind {
            Some(Kind::String(rules)) => self.string(&value, rules, ctx, errors),
            Some(Kind::Number(rules)) | Some(Kind::Integer(rules)) => number(&value, rules, ctx, errors),
            Some(Kind::Object(rules)) => value = self.object(value, rules, ctx, errors),
            Some(Kind::Array(rules)) => value = self.array(value, rules, ctx, errors),
            Some(Kind::Boolean) | Some(Kind::Null) | Some(Kind::Custom(_)) | None => {}
        }

        value = self.combinators(value, node, ctx, errors);

        if errors.len() == start {
            if let Some(hook) = &node.hook {
                self.hook(&value, hook, ctx, errors);
            }
        }
        value
    }

    fn resolve_kind<'n>(&self, value: &Value, node: &'n SchemaNode) -> Resolved<'n> {
        let matched = node.kinds.iter().find(|kind| match kind {
            Kind::Custom(name) => self.plugins.types.get(name).is_some_and(|t| t.check(value, node)),
            builtin => builtin.matches(value),
        });
        match matched {
            Some(kind) => Resolved::Kind(kind),
            // Inferred kinds only constrain values of their own shape
            None if node.kinds.is_empty() || !node.typed => Resolved::Any,
            None => Resolved::Mismatch,
        }
    }

    fn coerce<'n>(&self, value: &Value, node: &'n SchemaNode, ctx: &ValidationContext<'_>) -> Option<(&'n Kind, Value)> {
        if !ctx.options.coerce_types {
            return None;
        }
        node.kinds
            .iter()
            .find_map(|kind| coerce::coerce(value, kind).map(|coerced| (kind, coerced)))
    }

    fn string(&self, value: &Value, rules: &StringRules, ctx: &ValidationContext<'_>, errors: &mut Errors) {
        let Some(s) = value.as_str() else { return };
        let len = s.chars().count();

        if let Some(min) = rules.min_length {
            if len < min {
                errors.push(error(
                    ctx,
                    ValidationErrorKind::MinLength { limit: min },
                    format!("must NOT have fewer than {min} characters"),
                ));
            }
        }
        if let Some(max) = rules.max_length {
            if len > max {
                errors.push(error(
                    ctx,
                    ValidationErrorKind::MaxLength { limit: max },
                    format!("must NOT have more than {max} characters"),
                ));
            }
        }
        if let Some(pattern) = &rules.pattern {
            if !pattern.regex.is_match(s) {
                errors.push(error(
                    ctx,
                    ValidationErrorKind::Pattern { pattern: pattern.source.clone() },
                    format!("must match pattern \"{}\"", pattern.source),
                ));
            }
        }
        if let Some(format) = &rules.format {
            match self.plugins.formats.get(format) {
                Some(checker) if !checker.validate(s) => errors.push(error(
                    ctx,
                    ValidationErrorKind::Format { format: format.clone() },
                    checker.error().to_string(),
                )),
                Some(_) => {}
                None => debug!(format = %format, path = ctx.path(), "unknown format, skipping"),
            }
        }
    }

    fn object(&self, value: Value, rules: &ObjectRules, ctx: &ValidationContext<'_>, errors: &mut Errors) -> Value {
        let Value::Object(mut map) = value else { return value };

        if ctx.options.use_defaults {
            apply_defaults(&mut map, rules);
        }

        for key in &rules.required {
            if !map.contains_key(key) {
                errors.push(error(
                    &ctx.property(key),
                    ValidationErrorKind::Required { missing_property: key.clone() },
                    format!("must have required property '{key}'"),
                ));
            }
        }

        for (key, prop) in &rules.properties {
            if let Some(slot) = map.get_mut(key) {
                let current = slot.take();
                *slot = self.node(current, prop, &ctx.property(key), errors);
            }
        }

        let extra: Vec<String> = map
            .keys()
            .filter(|k| !rules.properties.contains_key(*k))
            .cloned()
            .collect();
        match &rules.additional {
            Additional::Allowed => {}
            Additional::Forbidden => {
                for key in extra {
                    if ctx.options.remove_additional {
                        map.remove(&key);
                    } else {
                        errors.push(error(
                            &ctx.property(&key),
                            ValidationErrorKind::AdditionalProperties { property: key.clone() },
                            "must NOT have additional properties".to_string(),
                        ));
                    }
                }
            }
            Additional::Schema(schema) => {
                for key in extra {
                    if let Some(slot) = map.get_mut(&key) {
                        let current = slot.take();
                        *slot = self.node(current, schema, &ctx.property(&key), errors);
                    }
                }
            }
        }

        let count = map.len();
        if let Some(min) = rules.min_properties {
            if count < min {
                errors.push(error(
                    ctx,
                    ValidationErrorKind::MinProperties { limit: min },
                    format!("must NOT have fewer than {min} properties"),
                ));
            }
        }
        if let Some(max) = rules.max_properties {
            if count > max {
                errors.push(error(
                    ctx,
                    ValidationErrorKind::MaxProperties { limit: max },
                    format!("must NOT have more than {max} properties"),
                ));
            }
        }

        Value::Object(map)
    }

    fn array(&self, value: Value, rules: &ArrayRules, ctx: &ValidationContext<'_>, errors: &mut Errors) -> Value {
        let Value::Array(mut items) = value else { return value };

        if let Some(min) = rules.min_items {
            if items.len() < min {
                errors.push(error(
                    ctx,
                    ValidationErrorKind::MinItems { limit: min },
                    format!("must NOT have fewer than {min} items"),
                ));
            }
        }
        if let Some(max) = rules.max_items {
            if items.len() > max {
                errors.push(error(
                    ctx,
                    ValidationErrorKind::MaxItems { limit: max },
                    format!("must NOT have more than {max} items"),
                ));
            }
        }

        match &rules.items {
            Items::Any => {}
            Items::Single(schema) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let current = item.take();
                    *item = self.node(current, schema, &ctx.index(i), errors);
                }
            }
            Items::Tuple(schemas) => {
                if items.len() > schemas.len() && matches!(rules.additional_items, Additional::Forbidden) {
                    errors.push(error(
                        ctx,
                        ValidationErrorKind::AdditionalItems { limit: schemas.len() },
                        format!("must NOT have more than {} items", schemas.len()),
                    ));
                }
                for (i, item) in items.iter_mut().enumerate() {
                    let schema = match (schemas.get(i), &rules.additional_items) {
                        (Some(schema), _) => schema,
                        (None, Additional::Schema(schema)) => schema.as_ref(),
                        (None, _) => break,
                    };
                    let current = item.take();
                    *item = self.node(current, schema, &ctx.index(i), errors);
                }
            }
        }

        // Runs on the validated items so coerced duplicates are caught too
        if rules.unique_items {
            let mut seen: HashMap<String, usize> = HashMap::new();
            for (i, item) in items.iter().enumerate() {
                let key = canonical_json(item);
                match seen.get(&key) {
                    Some(&first) => errors.push(error(
                        ctx,
                        ValidationErrorKind::UniqueItems { duplicate_index: i, first_index: first },
                        format!("must NOT have duplicate items (items {first} and {i} are identical)"),
                    )),
                    None => {
                        seen.insert(key, i);
                    }
                }
            }
        }

        Value::Array(items)
    }

    fn combinators(&self, mut value: Value, node: &SchemaNode, ctx: &ValidationContext<'_>, errors: &mut Errors) -> Value {
        for schema in &node.all_of {
            value = self.node(value, schema, ctx, errors);
        }

        if !node.any_of.is_empty() {
            let passing = node.any_of.iter().find_map(|schema| self.trial(&value, schema, ctx));
            match passing {
                Some(adopted) => value = adopted,
                None => errors.push(error(
                    ctx,
                    ValidationErrorKind::AnyOf,
                    "must match a schema in anyOf".to_string(),
                )),
            }
        }

        if !node.one_of.is_empty() {
            let passing: Vec<Value> = node
                .one_of
                .iter()
                .filter_map(|schema| self.trial(&value, schema, ctx))
                .collect();
            let matched = passing.len();
            match <[Value; 1]>::try_from(passing) {
                Ok([adopted]) => value = adopted,
                Err(_) => errors.push(error(
                    ctx,
                    ValidationErrorKind::OneOf { matched },
                    format!("must match exactly one schema in oneOf, matched {matched}"),
                )),
            }
        }

        if let Some(schema) = &node.not {
            if self.trial(&value, schema, ctx).is_some() {
                errors.push(error(ctx, ValidationErrorKind::Not, "must NOT be valid".to_string()));
            }
        }

        value
    }

    /// Validate against a branch without keeping its errors
    fn trial(&self, value: &Value, schema: &SchemaNode, ctx: &ValidationContext<'_>) -> Option<Value> {
        let mut scratch = Vec::new();
        let value = self.node(value.clone(), schema, ctx, &mut scratch);
        scratch.is_empty().then_some(value)
    }

    fn hook(&self, value: &Value, name: &str, ctx: &ValidationContext<'_>, errors: &mut Errors) {
        let outcome = match self.plugins.hooks.get(name) {
            None => Err(format!("validation hook '{name}' is not registered")),
            Some(hook) => panic::catch_unwind(AssertUnwindSafe(|| hook.call(value, ctx)))
                .unwrap_or_else(|_| Err(format!("validation hook '{name}' panicked"))),
        };
        if let Err(message) = outcome {
            errors.push(error(ctx, ValidationErrorKind::Custom { hook: name.to_string() }, message));
        }
    }
}

fn number(value: &Value, rules: &NumberRules, ctx: &ValidationContext<'_>, errors: &mut Errors) {
    let Some(n) = value.as_f64() else { return };

    if let Some(min) = rules.minimum {
        if n < min {
            errors.push(error(
                ctx,
                ValidationErrorKind::Minimum { limit: min, exclusive: false },
                format!("must be >= {min}"),
            ));
        }
    }
    if let Some(min) = rules.exclusive_minimum {
        if n <= min {
            errors.push(error(
                ctx,
                ValidationErrorKind::Minimum { limit: min, exclusive: true },
                format!("must be > {min}"),
            ));
        }
    }
    if let Some(max) = rules.maximum {
        if n > max {
            errors.push(error(
                ctx,
                ValidationErrorKind::Maximum { limit: max, exclusive: false },
                format!("must be <= {max}"),
            ));
        }
    }
    if let Some(max) = rules.exclusive_maximum {
        if n >= max {
            errors.push(error(
                ctx,
                ValidationErrorKind::Maximum { limit: max, exclusive: true },
                format!("must be < {max}"),
            ));
        }
    }
    if let Some(multiple) = rules.multiple_of {
        if !is_multiple_of(n, multiple) {
            errors.push(error(
                ctx,
                ValidationErrorKind::MultipleOf { multiple_of: multiple },
                format!("must be multiple of {multiple}"),
            ));
        }
    }
}

/// `value / multiple` must sit within a relative tolerance of an integer
pub(crate) fn is_multiple_of(value: f64, multiple: f64) -> bool {
    let quotient = value / multiple;
    if !quotient.is_finite() {
        return false;
    }
    (quotient - quotient.round()).abs() <= MULTIPLE_OF_TOLERANCE * quotient.abs().max(1.0)
}

pub(crate) fn apply_defaults(map: &mut Map<String, Value>, rules: &ObjectRules) {
    for (key, prop) in &rules.properties {
        if !map.contains_key(key) {
            if let Some(default) = &prop.default {
                map.insert(key.clone(), default.clone());
            }
        }
    }
}

fn type_error(value: &Value, node: &SchemaNode, ctx: &ValidationContext<'_>) -> ValidationError {
    let expected = node.type_names();
    let actual = json_type_name(value);
    let message = format!("must be {}", expected.join(","));
    error(
        ctx,
        ValidationErrorKind::Type {
            expected_types: expected,
            actual: actual.to_string(),
        },
        message,
    )
}

fn error(ctx: &ValidationContext<'_>, kind: ValidationErrorKind, message: String) -> ValidationError {
    ValidationError {
        kind,
        path: ctx.path().to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SchemaEngine, ValidationOptions, ValidationResult};
    use crate::plugins::{CustomType, Hook, Plugins};
    use serde_json::json;

    fn check(data: Value, schema: Value) -> ValidationResult {
        check_with(data, schema, ValidationOptions::default())
    }

    fn check_with(data: Value, schema: Value, options: ValidationOptions) -> ValidationResult {
        SchemaEngine::new().validate_json(&data, &schema, &options).unwrap()
    }

    fn codes(result: &ValidationResult) -> Vec<(&str, &str)> {
        result.errors.iter().map(|e| (e.code(), e.path.as_str())).collect()
    }

    #[test]
    fn test_collects_every_error() {
        let result = check(
            json!({ "name": "", "tags": [1, "x"], "extra": true }),
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            }),
        );
        assert!(!result.valid);
        assert_eq!(
            codes(&result),
            vec![("minLength", "name"), ("type", "tags[0]"), ("additionalProperties", "extra")]
        );
    }

    #[test]
    fn test_null_handling() {
        assert!(check(json!(null), json!({ "type": ["string", "null"] })).valid);
        assert!(check(json!(null), json!({ "type": "string", "nullable": true })).valid);
        let result = check(json!(null), json!({ "type": "string" }));
        assert_eq!(codes(&result), vec![("type", "")]);
    }

    #[test]
    fn test_number_bounds() {
        let schema = json!({ "type": "number", "exclusiveMinimum": 0, "maximum": 10, "multipleOf": 0.1 });
        assert!(check(json!(0.3), schema.clone()).valid);
        assert!(check(json!(10), schema.clone()).valid);
        assert_eq!(codes(&check(json!(0), schema.clone())), vec![("minimum", "")]);
        assert_eq!(codes(&check(json!(10.05), schema)), vec![("maximum", ""), ("multipleOf", "")]);
    }

    #[test]
    fn test_multiple_of_tolerance() {
        assert!(is_multiple_of(0.3, 0.1));
        assert!(is_multiple_of(1e20, 3.0));
        assert!(is_multiple_of(-4.0, 2.0));
        assert!(!is_multiple_of(7.0, 2.0));
        assert!(!is_multiple_of(0.35, 0.1));
    }

    #[test]
    fn test_integer_rejects_fractions() {
        let result = check(json!(1.5), json!({ "type": "integer" }));
        assert_eq!(codes(&result), vec![("type", "")]);
        assert!(check(json!(2.0), json!({ "type": "integer" })).valid);
    }

    #[test]
    fn test_string_checks_and_format() {
        let schema = json!({ "type": "string", "maxLength": 5, "pattern": "^[a-z]+$", "format": "email" });
        let result = check(json!("Not-An-Email"), schema);
        assert_eq!(codes(&result), vec![("maxLength", ""), ("pattern", ""), ("format", "")]);
        assert!(check(json!("anything"), json!({ "type": "string", "format": "no-such-format" })).valid);
    }

    #[test]
    fn test_enum() {
        let schema = json!({ "enum": ["red", "green", 3] });
        assert!(check(json!(3), schema.clone()).valid);
        assert_eq!(codes(&check(json!("blue"), schema)), vec![("enum", "")]);
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(check(json!(1.0), json!({ "enum": [1, 2] })).valid);
        assert!(check(json!(2), json!({ "enum": [1.0, 2.0] })).valid);
        assert!(check(json!(5.0), json!({ "const": 5 })).valid);
        assert_eq!(codes(&check(json!(6), json!({ "const": 5 }))), vec![("enum", "")]);

        let result = check(json!([1, 1.0]), json!({ "type": "array", "uniqueItems": true }));
        assert_eq!(result.errors[0].kind, ValidationErrorKind::UniqueItems { duplicate_index: 1, first_index: 0 });
        assert!(check(json!([1, 1.5]), json!({ "type": "array", "uniqueItems": true })).valid);
    }

    #[test]
    fn test_false_subschemas() {
        let object = json!({ "type": "object", "properties": { "legacy": false, "name": { "type": "string" } } });
        assert!(check(json!({ "name": "x" }), object.clone()).valid);
        assert_eq!(codes(&check(json!({ "legacy": null }), object.clone())), vec![("not", "legacy")]);
        assert_eq!(codes(&check(json!({ "legacy": 1 }), object)), vec![("not", "legacy")]);

        let array = json!({ "type": "array", "items": false });
        assert!(check(json!([]), array.clone()).valid);
        assert_eq!(codes(&check(json!([1, "a"]), array)), vec![("not", "[0]"), ("not", "[1]")]);
    }

    #[test]
    fn test_tuple_items() {
        let schema = json!({
            "type": "array",
            "items": [{ "type": "string" }, { "type": "integer" }],
            "additionalItems": false
        });
        assert!(check(json!(["a", 1]), schema.clone()).valid);
        let result = check(json!(["a", "b", true]), schema);
        assert_eq!(codes(&result), vec![("additionalItems", ""), ("type", "[1]")]);

        let schema = json!({
            "type": "array",
            "items": [{ "type": "string" }],
            "additionalItems": { "type": "boolean" }
        });
        assert_eq!(codes(&check(json!(["a", true, 1]), schema)), vec![("type", "[2]")]);
    }

    #[test]
    fn test_additional_properties_schema() {
        let schema = json!({
            "type": "object",
            "properties": { "id": { "type": "string" } },
            "additionalProperties": { "type": "integer" },
            "maxProperties": 2
        });
        let result = check(json!({ "id": "a", "x": 1, "y": "no" }), schema);
        assert_eq!(codes(&result), vec![("type", "y"), ("maxProperties", "")]);
    }

    #[test]
    fn test_remove_additional_and_defaults() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "role": { "type": "string", "default": "member" },
                "name": { "type": "string" }
            }
        });
        let options = ValidationOptions { use_defaults: true, remove_additional: true, ..Default::default() };
        let result = check_with(json!({ "name": "ada", "junk": 1 }), schema, options);
        assert!(result.valid);
        assert_eq!(result.data, json!({ "name": "ada", "role": "member" }));
    }

    #[test]
    fn test_default_satisfies_required() {
        let schema = json!({
            "type": "object",
            "required": ["role"],
            "properties": { "role": { "type": "string", "default": "member" } }
        });
        assert!(!check(json!({}), schema.clone()).valid);
        let options = ValidationOptions { use_defaults: true, ..Default::default() };
        assert!(check_with(json!({}), schema, options).valid);
    }

    #[test]
    fn test_nested_coercion_written_back() {
        let schema = json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer" },
                "flags": { "type": "array", "items": { "type": "boolean" } }
            }
        });
        let options = ValidationOptions { coerce_types: true, ..Default::default() };
        let result = check_with(json!({ "count": "7", "flags": "yes,no" }), schema, options);
        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(result.data, json!({ "count": 7, "flags": [true, false] }));
    }

    #[test]
    fn test_combinators() {
        let any = json!({ "anyOf": [{ "type": "string" }, { "type": "integer" }] });
        assert!(check(json!(4), any.clone()).valid);
        assert_eq!(codes(&check(json!(true), any)), vec![("anyOf", "")]);

        let one = json!({ "oneOf": [{ "type": "integer" }, { "type": "number" }] });
        assert!(check(json!(1.5), one.clone()).valid);
        let result = check(json!(2), one);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::OneOf { matched: 2 });

        let all = json!({ "allOf": [{ "type": "string" }, { "minLength": 3 }] });
        assert_eq!(codes(&check(json!("ab"), all)), vec![("minLength", "")]);

        let not = json!({ "not": { "type": "string" } });
        assert!(check(json!(1), not.clone()).valid);
        assert_eq!(codes(&check(json!("s"), not)), vec![("not", "")]);
    }

    #[test]
    fn test_custom_type_and_hooks() {
        let mut plugins = Plugins::default();
        plugins
            .types
            .register("even", CustomType::new(|v, _| v.as_i64().is_some_and(|n| n % 2 == 0)));
        plugins.hooks.register(
            "not-admin",
            Hook::new(|v, _| if v == "admin" { Err("reserved name".into()) } else { Ok(()) }),
        );
        plugins.hooks.register("boom", Hook::new(|_, _| panic!("hook failure")));
        let engine = SchemaEngine::with_plugins(plugins);
        let options = ValidationOptions::default();

        let even = SchemaNode::from_value(&json!({ "type": "even" })).unwrap();
        assert!(engine.validate(&json!(4), &even, &options).unwrap().valid);
        assert!(!engine.validate(&json!(5), &even, &options).unwrap().valid);

        let named = SchemaNode::from_value(&json!({ "type": "string", "x-validate": "not-admin" })).unwrap();
        let result = engine.validate(&json!("admin"), &named, &options).unwrap();
        assert_eq!(result.errors[0].code(), "custom");
        assert_eq!(result.errors[0].message, "reserved name");

        let panicky = SchemaNode::from_value(&json!({ "x-validate": "boom" })).unwrap();
        let result = engine.validate(&json!(1), &panicky, &options).unwrap();
        assert_eq!(result.errors[0].code(), "custom");

        // Hooks only run once the node's own checks passed
        let gated = SchemaNode::from_value(&json!({ "type": "string", "minLength": 9, "x-validate": "boom" })).unwrap();
        let result = engine.validate(&json!("short"), &gated, &options).unwrap();
        assert_eq!(codes(&result), vec![("minLength", "")]);
    }
}
