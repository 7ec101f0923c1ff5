//! Schema tree types
//!
//! A schema is authored as JSON and parsed once into an immutable
//! [`SchemaNode`] tree. Every node carries a closed list of [`Kind`]s, each
//! with the rules that apply when a value has that shape, so the engine never
//! has to interpret raw keywords at validation time.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};
use crate::fingerprint::canonical_json;

/// Keyword naming a registered custom validation hook
pub const HOOK_KEYWORD: &str = "x-validate";

/// One constraint-bearing node of a schema tree
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Declared (or inferred) kinds; empty means any value
    pub kinds: Vec<Kind>,
    /// Whether `kinds` came from an explicit `type` keyword. Inferred kinds
    /// only constrain values of their own shape.
    pub typed: bool,
    pub nullable: bool,
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub all_of: Vec<SchemaNode>,
    pub any_of: Vec<SchemaNode>,
    pub one_of: Vec<SchemaNode>,
    pub not: Option<Box<SchemaNode>>,
    /// Name of a hook in the engine's hook registry
    pub hook: Option<String>,
}

/// Shape of a value together with the rules for that shape
#[derive(Debug, Clone)]
pub enum Kind {
    String(StringRules),
    Number(NumberRules),
    Integer(NumberRules),
    Boolean,
    Null,
    Object(ObjectRules),
    Array(ArrayRules),
    /// A type registered in the engine's type registry
    Custom(String),
}

#[derive(Debug, Clone, Default)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    pub format: Option<String>,
}

/// A compiled `pattern` keyword
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    pub regex: Regex,
}

#[derive(Debug, Clone, Default)]
pub struct NumberRules {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectRules {
    pub properties: BTreeMap<String, SchemaNode>,
    pub required: Vec<String>,
    pub additional: Additional,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ArrayRules {
    pub items: Items,
    pub additional_items: Additional,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,
}

/// `additionalProperties` / `additionalItems`
#[derive(Debug, Clone, Default)]
pub enum Additional {
    #[default]
    Allowed,
    Forbidden,
    Schema(Box<SchemaNode>),
}

/// `items`
#[derive(Debug, Clone, Default)]
pub enum Items {
    #[default]
    Any,
    Single(Box<SchemaNode>),
    Tuple(Vec<SchemaNode>),
}

impl Kind {
    /// Type name as written in schemas
    pub fn name(&self) -> &str {
        match self {
            Kind::String(_) => "string",
            Kind::Number(_) => "number",
            Kind::Integer(_) => "integer",
            Kind::Boolean => "boolean",
            Kind::Null => "null",
            Kind::Object(_) => "object",
            Kind::Array(_) => "array",
            Kind::Custom(name) => name,
        }
    }

    /// Whether a value has this built-in shape. Custom kinds never match here;
    /// they are resolved against the type registry by the engine.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Kind::String(_) => value.is_string(),
            Kind::Number(_) => value.is_number(),
            Kind::Integer(_) => is_integer(value),
            Kind::Boolean => value.is_boolean(),
            Kind::Null => value.is_null(),
            Kind::Object(_) => value.is_object(),
            Kind::Array(_) => value.is_array(),
            Kind::Custom(_) => false,
        }
    }
}

impl ObjectRules {
    pub fn is_required(&self, key: &str) -> bool {
        self.required.iter().any(|r| r == key)
    }
}

impl SchemaNode {
    /// Parse a schema tree from its JSON form
    pub fn from_value(value: &Value) -> Result<Self> {
        parse_node(value, "#")
    }

    /// A node that accepts any value
    pub fn any() -> Self {
        Self::default()
    }

    /// The `false` schema: rejects every value
    pub fn never() -> Self {
        Self {
            not: Some(Box::new(Self::any())),
            ..Self::default()
        }
    }

    /// Whether the node places no constraint on values
    pub fn is_unconstrained(&self) -> bool {
        self.kinds.is_empty()
            && self.enum_values.is_none()
            && self.all_of.is_empty()
            && self.any_of.is_empty()
            && self.one_of.is_empty()
            && self.not.is_none()
            && self.hook.is_none()
    }

    /// Whether no value can satisfy the node, as with the `false` schema
    pub fn is_never(&self) -> bool {
        self.not.as_deref().is_some_and(SchemaNode::is_unconstrained)
    }

    pub fn accepts_null(&self) -> bool {
        self.nullable || !self.typed || self.kinds.iter().any(|k| matches!(k, Kind::Null))
    }

    /// Kind names for messages and docs
    pub fn type_names(&self) -> Vec<String> {
        self.kinds.iter().map(|k| k.name().to_string()).collect()
    }

    pub fn object_rules(&self) -> Option<&ObjectRules> {
        self.kinds.iter().find_map(|k| match k {
            Kind::Object(rules) => Some(rules),
            _ => None,
        })
    }

    pub fn array_rules(&self) -> Option<&ArrayRules> {
        self.kinds.iter().find_map(|k| match k {
            Kind::Array(rules) => Some(rules),
            _ => None,
        })
    }

    pub fn string_rules(&self) -> Option<&StringRules> {
        self.kinds.iter().find_map(|k| match k {
            Kind::String(rules) => Some(rules),
            _ => None,
        })
    }
}

/// Integer test that also accepts floats with no fractional part
pub fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

/// Runtime shape name of a JSON value
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

const OBJECT_KEYWORDS: &[&str] = &[
    "properties",
    "required",
    "additionalProperties",
    "minProperties",
    "maxProperties",
];
const ARRAY_KEYWORDS: &[&str] = &["items", "additionalItems", "minItems", "maxItems", "uniqueItems"];
const STRING_KEYWORDS: &[&str] = &["minLength", "maxLength", "pattern", "format"];
const NUMBER_KEYWORDS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

fn parse_node(value: &Value, path: &str) -> Result<SchemaNode> {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::Bool(true) => return Ok(SchemaNode::any()),
        Value::Bool(false) => return Ok(SchemaNode::never()),
        other => {
            return Err(SchemaError::invalid(
                path,
                format!("schema must be an object, found {}", json_type_name(other)),
            ))
        }
    };

    let mut node = SchemaNode {
        title: opt_string(obj, "title"),
        description: opt_string(obj, "description"),
        nullable: obj.get("nullable").and_then(Value::as_bool).unwrap_or(false),
        default: obj.get("default").cloned(),
        example: obj
            .get("example")
            .cloned()
            .or_else(|| obj.get("examples").and_then(Value::as_array).and_then(|e| e.first().cloned())),
        hook: opt_string(obj, HOOK_KEYWORD),
        ..SchemaNode::default()
    };

    if let Some(values) = obj.get("enum") {
        let values = values
            .as_array()
            .ok_or_else(|| SchemaError::invalid(path, "enum must be an array"))?;
        node.enum_values = Some(values.clone());
    }
    // `const` is a one-value enum, narrowed by `enum` when both appear
    if let Some(constant) = obj.get("const") {
        node.enum_values = Some(match node.enum_values.take() {
            Some(values) => {
                let key = canonical_json(constant);
                values.into_iter().filter(|v| canonical_json(v) == key).collect()
            }
            None => vec![constant.clone()],
        });
    }

    node.all_of = parse_list(obj, "allOf", path)?;
    node.any_of = parse_list(obj, "anyOf", path)?;
    node.one_of = parse_list(obj, "oneOf", path)?;
    if let Some(not) = obj.get("not") {
        node.not = Some(Box::new(parse_node(not, &format!("{path}/not"))?));
    }

    let type_names: Vec<String> = match obj.get("type") {
        None => Vec::new(),
        Some(Value::String(name)) => vec![name.clone()],
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SchemaError::invalid(path, "type entries must be strings"))
            })
            .collect::<Result<_>>()?,
        Some(_) => return Err(SchemaError::invalid(path, "type must be a string or an array")),
    };

    node.typed = !type_names.is_empty();
    let names = if node.typed { type_names } else { infer_kinds(obj) };
    for name in names {
        let kind = match name.as_str() {
            "string" => Kind::String(parse_string_rules(obj, path)?),
            "number" => Kind::Number(parse_number_rules(obj, path)?),
            "integer" => Kind::Integer(parse_number_rules(obj, path)?),
            "boolean" => Kind::Boolean,
            "null" => Kind::Null,
            "object" => Kind::Object(parse_object_rules(obj, path)?),
            "array" => Kind::Array(parse_array_rules(obj, path)?),
            _ => Kind::Custom(name),
        };
        node.kinds.push(kind);
    }

    Ok(node)
}

fn infer_kinds(obj: &Map<String, Value>) -> Vec<String> {
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| obj.contains_key(*k));
    let mut names = Vec::new();
    if has_any(OBJECT_KEYWORDS) {
        names.push("object".to_string());
    }
    if has_any(ARRAY_KEYWORDS) {
        names.push("array".to_string());
    }
    if has_any(STRING_KEYWORDS) {
        names.push("string".to_string());
    }
    if has_any(NUMBER_KEYWORDS) {
        names.push("number".to_string());
    }
    names
}

fn parse_list(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Vec<SchemaNode>> {
    match obj.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_node(item, &format!("{path}/{key}/{i}")))
            .collect(),
        Some(_) => Err(SchemaError::invalid(path, format!("{key} must be an array"))),
    }
}

fn parse_string_rules(obj: &Map<String, Value>, path: &str) -> Result<StringRules> {
    let pattern = match obj.get("pattern") {
        None => None,
        Some(Value::String(source)) => {
            let regex = Regex::new(source)
                .map_err(|e| SchemaError::invalid(path, format!("invalid pattern: {e}")))?;
            Some(Pattern { source: source.clone(), regex })
        }
        Some(_) => return Err(SchemaError::invalid(path, "pattern must be a string")),
    };

    Ok(StringRules {
        min_length: opt_usize(obj, "minLength", path)?,
        max_length: opt_usize(obj, "maxLength", path)?,
        pattern,
        format: opt_string(obj, "format"),
    })
}

fn parse_number_rules(obj: &Map<String, Value>, path: &str) -> Result<NumberRules> {
    let mut rules = NumberRules {
        minimum: opt_f64(obj, "minimum", path)?,
        maximum: opt_f64(obj, "maximum", path)?,
        multiple_of: opt_f64(obj, "multipleOf", path)?,
        ..NumberRules::default()
    };

    // Draft-04 booleans turn minimum/maximum exclusive; later drafts use numbers
    match obj.get("exclusiveMinimum") {
        Some(Value::Bool(true)) => rules.exclusive_minimum = rules.minimum.take(),
        Some(Value::Bool(false)) | None => {}
        Some(_) => rules.exclusive_minimum = opt_f64(obj, "exclusiveMinimum", path)?,
    }
    match obj.get("exclusiveMaximum") {
        Some(Value::Bool(true)) => rules.exclusive_maximum = rules.maximum.take(),
        Some(Value::Bool(false)) | None => {}
        Some(_) => rules.exclusive_maximum = opt_f64(obj, "exclusiveMaximum", path)?,
    }

    if rules.multiple_of.is_some_and(|m| m <= 0.0) {
        return Err(SchemaError::invalid(path, "multipleOf must be greater than 0"));
    }
    Ok(rules)
}

fn parse_object_rules(obj: &Map<String, Value>, path: &str) -> Result<ObjectRules> {
    let mut rules = ObjectRules {
        min_properties: opt_usize(obj, "minProperties", path)?,
        max_properties: opt_usize(obj, "maxProperties", path)?,
        additional: parse_additional(obj.get("additionalProperties"), &format!("{path}/additionalProperties"))?,
        ..ObjectRules::default()
    };

    match obj.get("required") {
        None | Some(Value::Bool(_)) => {}
        Some(Value::Array(keys)) => {
            for key in keys {
                let key = key
                    .as_str()
                    .ok_or_else(|| SchemaError::invalid(path, "required entries must be strings"))?;
                rules.required.push(key.to_string());
            }
        }
        Some(_) => return Err(SchemaError::invalid(path, "required must be an array")),
    }

    if let Some(props) = obj.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| SchemaError::invalid(path, "properties must be an object"))?;
        for (key, prop) in props {
            let child = parse_node(prop, &format!("{path}/properties/{key}"))?;
            // Per-property `required: true` flags join the parent's set
            if prop.get("required").and_then(Value::as_bool) == Some(true) && !rules.is_required(key) {
                rules.required.push(key.clone());
            }
            rules.properties.insert(key.clone(), child);
        }
    }

    Ok(rules)
}

fn parse_array_rules(obj: &Map<String, Value>, path: &str) -> Result<ArrayRules> {
    let items = match obj.get("items") {
        None => Items::Any,
        Some(Value::Array(list)) => Items::Tuple(
            list.iter()
                .enumerate()
                .map(|(i, item)| parse_node(item, &format!("{path}/items/{i}")))
                .collect::<Result<_>>()?,
        ),
        Some(item) => Items::Single(Box::new(parse_node(item, &format!("{path}/items"))?)),
    };

    Ok(ArrayRules {
        items,
        additional_items: parse_additional(obj.get("additionalItems"), &format!("{path}/additionalItems"))?,
        min_items: opt_usize(obj, "minItems", path)?,
        max_items: opt_usize(obj, "maxItems", path)?,
        unique_items: obj.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn parse_additional(value: Option<&Value>, path: &str) -> Result<Additional> {
    match value {
        None | Some(Value::Bool(true)) => Ok(Additional::Allowed),
        Some(Value::Bool(false)) => Ok(Additional::Forbidden),
        Some(schema) => Ok(Additional::Schema(Box::new(parse_node(schema, path)?))),
    }
}

fn opt_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn opt_usize(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<usize>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| SchemaError::invalid(path, format!("{key} must be a non-negative integer"))),
    }
}

fn opt_f64(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<f64>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| SchemaError::invalid(path, format!("{key} must be a number"))),
    }
}
